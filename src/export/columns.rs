//! Column planning
//!
//! Header order is a curated priority prefix followed by every other key in
//! byte-wise lexicographic order, so the same key set always yields the same
//! header no matter which page a key first appeared on.

use std::collections::{BTreeSet, HashSet};

use crate::model::FlatRow;

/// Default priority prefix shared by every shape.
pub const DEFAULT_PRIORITY_COLUMNS: &[&str] = &[
    // identity
    "device_id",
    "timestamp",
    "model_id",
    "id",
    "name",
    "type",
    // taxonomy
    "family",
    "genus",
    "species",
    "family_confidence",
    "genus_confidence",
    "species_confidence",
    // geometry
    "bbox_xmin",
    "bbox_ymin",
    "bbox_xmax",
    "bbox_ymax",
    "latitude",
    "longitude",
    "altitude",
    // storage
    "image_key",
    "image_bucket",
    "video_key",
    "video_bucket",
    // free-form identifiers
    "track_id",
    "created",
    "description",
    "version",
];

/// Ordered, duplicate-free list of output columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnPlan {
    columns: Vec<String>,
}

impl ColumnPlan {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Cells of `row` in plan order; missing keys become empty strings.
    pub fn project<'a>(&'a self, row: &'a FlatRow) -> impl Iterator<Item = &'a str> + 'a {
        self.columns
            .iter()
            .map(move |column| row.get(column).map(String::as_str).unwrap_or(""))
    }
}

/// Compute the column order for a set of observed keys.
///
/// Priority names that were never observed are left out; priority names
/// listed twice appear once.
pub fn plan<S: AsRef<str>>(priority: &[S], seen: &BTreeSet<String>) -> ColumnPlan {
    let mut placed: HashSet<&str> = HashSet::with_capacity(priority.len());
    let mut columns = Vec::with_capacity(seen.len());

    for name in priority {
        let name = name.as_ref();
        if seen.contains(name) && placed.insert(name) {
            columns.push(name.to_string());
        }
    }

    // BTreeSet iteration is already byte-wise ascending.
    columns.extend(
        seen.iter()
            .filter(|key| !placed.contains(key.as_str()))
            .cloned(),
    );

    ColumnPlan { columns }
}

/// Running superset of keys across every row of an export.
#[derive(Debug, Clone, Default)]
pub struct ColumnTracker {
    seen: BTreeSet<String>,
}

impl ColumnTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the tracker with columns that should exist even before any row
    /// mentions them.
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            seen: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Record the keys of one row.
    pub fn observe(&mut self, row: &FlatRow) {
        for key in row.keys() {
            if !self.seen.contains(key) {
                self.seen.insert(key.clone());
            }
        }
    }

    pub fn plan<S: AsRef<str>>(&self, priority: &[S]) -> ColumnPlan {
        plan(priority, &self.seen)
    }
}
