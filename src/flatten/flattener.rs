//! Shape-aware record flattening
//!
//! Expands one nested record into a single column → text map. Fields are
//! matched against these rules, first match wins:
//!
//! 1. Coordinate fields declared by the shape (bounding boxes, locations)
//!    expand into named sibling columns.
//! 2. Sequences of `{name, confidence}` mappings become a count column plus
//!    1-indexed positional columns.
//! 3. Nested mappings recurse, joining keys with `_`.
//! 4. Everything else goes through the scalar normaliser unchanged.
//!
//! A coordinate field with the wrong structure falls back to rule 4 under its
//! own name. Flattening never fails.

use std::collections::BTreeMap;

use tracing::debug;

use crate::model::{Decimal, FlatRow, Record, ShapeKind, ShapeRules, Value};

use super::normalizer::{CellConverter, PlainCellConverter, encode_structure};

const BOX_COLUMNS: [&str; 4] = ["bbox_xmin", "bbox_ymin", "bbox_xmax", "bbox_ymax"];

/// Tunables for the flattener.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlattenOptions {
    /// Keep at most this many positional columns per ranked-alternative list.
    ///
    /// The `_count` column always reports the full length.
    pub max_ranked_alternatives: Option<usize>,
}

/// A flattened record plus what went wrong while flattening it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flattened {
    pub row: FlatRow,
    /// Fields that did not match their declared structure, or whose column
    /// collided with one already written.
    pub malformed: u32,
}

/// Flattens records of a single shape.
#[derive(Debug, Clone)]
pub struct Flattener {
    shape: ShapeKind,
    rules: ShapeRules,
    options: FlattenOptions,
    converter: PlainCellConverter,
}

impl Flattener {
    pub fn new(shape: ShapeKind, options: FlattenOptions) -> Self {
        Self {
            shape,
            rules: shape.rules(),
            options,
            converter: PlainCellConverter::new(),
        }
    }

    /// Flatten one record into a row.
    pub fn flatten(&self, record: &Record) -> FlatRow {
        self.flatten_with_diagnostics(record).row
    }

    /// Flatten one record, also counting malformed fields.
    pub fn flatten_with_diagnostics(&self, record: &Record) -> Flattened {
        let mut out = Flattened::default();

        for (key, value) in record {
            let key = key.as_str();

            if self.rules.bounding_box_fields.contains(&key) {
                self.flatten_coordinate(key, value, expand_bounding_box, &mut out);
            } else if self.rules.geo_fields.contains(&key) {
                self.flatten_coordinate(key, value, expand_geo, &mut out);
            } else {
                let prefix = self.alias(key);
                self.visit(prefix, value, &mut out);
            }
        }

        out
    }

    fn alias<'a>(&self, key: &'a str) -> &'a str {
        self.rules
            .prefix_aliases
            .iter()
            .find(|(field, _)| *field == key)
            .map(|(_, alias)| *alias)
            .unwrap_or(key)
    }

    fn flatten_coordinate(
        &self,
        key: &str,
        value: &Value,
        expand: for<'a> fn(&str, &'a Value) -> Option<Vec<(String, &'a Value)>>,
        out: &mut Flattened,
    ) {
        if matches!(value, Value::Absent) {
            return;
        }

        match expand(key, value) {
            Some(columns) => {
                for (column, cell) in columns {
                    self.visit(&column, cell, out);
                }
            }
            None => {
                debug!(
                    shape = %self.shape,
                    field = key,
                    "coordinate field has unexpected structure, keeping it encoded"
                );
                out.malformed += 1;
                self.insert(key.to_string(), self.converter.convert(value), out);
            }
        }
    }

    fn visit(&self, path: &str, value: &Value, out: &mut Flattened) {
        match value {
            Value::Sequence(items) if is_ranked_alternatives(items) => {
                self.insert(format!("{path}_count"), items.len().to_string(), out);

                let keep = self
                    .options
                    .max_ranked_alternatives
                    .map_or(items.len(), |max| max.min(items.len()));

                for (i, item) in items.iter().take(keep).enumerate() {
                    self.visit(&format!("{path}_{}", i + 1), item, out);
                }
            }
            Value::Mapping(map) if map.is_empty() => {
                self.insert(path.to_string(), encode_structure(value), out);
            }
            Value::Mapping(map) => {
                for (child, child_value) in map {
                    self.visit(&format!("{path}_{child}"), child_value, out);
                }
            }
            _ => self.insert(path.to_string(), self.converter.convert(value), out),
        }
    }

    fn insert(&self, column: String, cell: String, out: &mut Flattened) {
        if out.row.contains_key(&column) {
            debug!(shape = %self.shape, column = %column, "duplicate column, keeping first value");
            out.malformed += 1;
            return;
        }
        out.row.insert(column, cell);
    }
}

/// Flatten one record with default options.
pub fn flatten(record: &Record, shape: ShapeKind) -> FlatRow {
    Flattener::new(shape, FlattenOptions::default()).flatten(record)
}

/// Non-empty, and every element is a mapping carrying `name` and `confidence`.
fn is_ranked_alternatives(items: &[Value]) -> bool {
    !items.is_empty()
        && items.iter().all(|item| {
            item.as_mapping()
                .is_some_and(|m| m.contains_key("name") && m.contains_key("confidence"))
        })
}

fn numbers(items: &[Value]) -> Option<Vec<&Decimal>> {
    items.iter().map(Value::as_decimal).collect()
}

/// `[xmin, ymin, xmax, ymax]` → `bbox_*` columns.
fn expand_bounding_box<'a>(_field: &str, value: &'a Value) -> Option<Vec<(String, &'a Value)>> {
    let items = value.as_sequence()?;
    if items.len() != BOX_COLUMNS.len() || numbers(items).is_none() {
        return None;
    }

    Some(
        BOX_COLUMNS
            .iter()
            .zip(items)
            .map(|(column, item)| (column.to_string(), item))
            .collect(),
    )
}

/// `{lat, long, alt?}` or `[lat, long, alt?]` → `latitude`, `longitude`, `altitude`.
///
/// Extra keys on the mapping form are kept as `<field>_<key>`.
fn expand_geo<'a>(field: &str, value: &'a Value) -> Option<Vec<(String, &'a Value)>> {
    match value {
        Value::Sequence(items) => {
            if !(2..=3).contains(&items.len()) || numbers(items).is_none() {
                return None;
            }
            Some(
                ["latitude", "longitude", "altitude"]
                    .iter()
                    .zip(items)
                    .map(|(column, item)| (column.to_string(), item))
                    .collect(),
            )
        }
        Value::Mapping(map) => expand_geo_mapping(field, map),
        _ => None,
    }
}

fn expand_geo_mapping<'a>(
    field: &str,
    map: &'a BTreeMap<String, Value>,
) -> Option<Vec<(String, &'a Value)>> {
    let lat = map.get("lat").filter(|v| v.as_decimal().is_some())?;
    let long = map.get("long").filter(|v| v.as_decimal().is_some())?;

    let mut columns = vec![("latitude".to_string(), lat), ("longitude".to_string(), long)];

    match map.get("alt") {
        None | Some(Value::Absent) => {}
        Some(alt @ Value::Number(_)) => columns.push(("altitude".to_string(), alt)),
        Some(_) => return None,
    }

    for (key, extra) in map {
        if !matches!(key.as_str(), "lat" | "long" | "alt") {
            columns.push((format!("{field}_{key}"), extra));
        }
    }

    Some(columns)
}
