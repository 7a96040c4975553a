//! In-memory record store
//!
//! Holds records per shape and pages through them the way the hosted store
//! does: a bounded page plus an opaque token describing where to resume.
//! Backs the command-line tool (records loaded from a JSON dump) and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::model::{Record, ShapeKind, Value};

use super::{ContinuationToken, Page, QueryFilters, RecordStore};

/// Routing field honoured by [`MemoryStore::from_json_text`].
pub const SHAPE_FIELD: &str = "_shape";

#[derive(Debug, Serialize, Deserialize)]
struct Cursor {
    offset: usize,
}

/// Paginating store backed by a `Vec` per shape.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: HashMap<ShapeKind, Vec<Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, shape: ShapeKind, record: Record) {
        self.tables.entry(shape).or_default().push(record);
    }

    pub fn extend(&mut self, shape: ShapeKind, records: impl IntoIterator<Item = Record>) {
        self.tables.entry(shape).or_default().extend(records);
    }

    /// Number of records held for `shape`.
    pub fn len(&self, shape: ShapeKind) -> usize {
        self.tables.get(&shape).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(Vec::is_empty)
    }

    /// Load records from a JSON array or JSON Lines text.
    ///
    /// A record carrying a string `_shape` field is filed under that shape
    /// (the field itself is removed); every other record goes to `default`.
    pub fn from_json_text(default: ShapeKind, text: &str) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for mut record in parse_records(text)? {
            let shape = match record.remove(SHAPE_FIELD) {
                None => default,
                Some(Value::String(name)) => name
                    .parse()
                    .map_err(|e| StoreError::Malformed(format!("{SHAPE_FIELD}: {e}")))?,
                Some(other) => {
                    return Err(StoreError::Malformed(format!(
                        "{SHAPE_FIELD} must be a string, got {}",
                        other.to_json()
                    )));
                }
            };
            store.insert(shape, record);
        }

        for shape in ShapeKind::ALL {
            if store.len(shape) > 0 {
                debug!("Loaded {} {} records", store.len(shape), shape);
            }
        }
        Ok(store)
    }

    fn encode_cursor(offset: usize) -> ContinuationToken {
        let json = serde_json::to_vec(&Cursor { offset }).unwrap_or_default();
        ContinuationToken::new(URL_SAFE_NO_PAD.encode(json))
    }

    fn decode_cursor(token: &ContinuationToken) -> Result<usize, StoreError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.as_str())
            .map_err(|e| StoreError::InvalidToken(e.to_string()))?;
        let cursor: Cursor =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::InvalidToken(e.to_string()))?;
        Ok(cursor.offset)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch_page(
        &self,
        shape: ShapeKind,
        filters: &QueryFilters,
        token: Option<&ContinuationToken>,
        page_size: usize,
    ) -> Result<Page, StoreError> {
        let offset = match token {
            Some(t) if !t.is_empty() => Self::decode_cursor(t)?,
            _ => 0,
        };

        let matching: Vec<&Record> = self
            .tables
            .get(&shape)
            .map(|records| records.iter().filter(|r| filters.matches(r)).collect())
            .unwrap_or_default();

        if offset > matching.len() {
            return Err(StoreError::InvalidToken(format!(
                "offset {offset} is past the end of the result set"
            )));
        }

        let end = offset.saturating_add(page_size.max(1)).min(matching.len());
        let records = matching[offset..end].iter().map(|r| (*r).clone()).collect();
        let next_token = (end < matching.len()).then(|| Self::encode_cursor(end));

        Ok(Page {
            records,
            next_token,
        })
    }
}

/// Parse a JSON array of objects, or one object per line.
fn parse_records(text: &str) -> Result<Vec<Record>, StoreError> {
    let trimmed = text.trim_start();

    let values: Vec<Value> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(|e| StoreError::Malformed(e.to_string()))?
    } else {
        trimmed
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line)
                    .map_err(|e| StoreError::Malformed(format!("line {}: {e}", n + 1)))
            })
            .collect::<Result<_, _>>()?
    };

    values
        .into_iter()
        .enumerate()
        .map(|(n, value)| {
            value
                .into_record()
                .ok_or_else(|| StoreError::Malformed(format!("record {} is not an object", n + 1)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with(n: usize) -> MemoryStore {
        let mut store = MemoryStore::new();
        for i in 0..n {
            let record = Value::from(json!({"device_id": format!("device-{i}")}))
                .into_record()
                .unwrap();
            store.insert(ShapeKind::Detection, record);
        }
        store
    }

    #[tokio::test]
    async fn test_pages_through_everything() {
        let store = store_with(25);
        let filters = QueryFilters::default();

        let mut token = None;
        let mut seen = 0;
        let mut pages = 0;
        loop {
            let page = store
                .fetch_page(ShapeKind::Detection, &filters, token.as_ref(), 10)
                .await
                .unwrap();
            seen += page.records.len();
            pages += 1;
            if !page.has_more() {
                break;
            }
            token = page.next_token;
        }

        assert_eq!(seen, 25);
        assert_eq!(pages, 3);
    }

    #[tokio::test]
    async fn test_unknown_shape_is_empty() {
        let store = store_with(3);
        let page = store
            .fetch_page(ShapeKind::Video, &QueryFilters::default(), None, 10)
            .await
            .unwrap();
        assert!(page.records.is_empty());
        assert!(!page.has_more());
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected() {
        let store = store_with(3);
        let token = ContinuationToken::new("not base64 at all!");
        let err = store
            .fetch_page(ShapeKind::Detection, &QueryFilters::default(), Some(&token), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_token_past_end_is_rejected() {
        let store = store_with(3);
        let token = MemoryStore::encode_cursor(99);
        let result = store
            .fetch_page(ShapeKind::Detection, &QueryFilters::default(), Some(&token), 10)
            .await;
        assert!(matches!(result, Err(StoreError::InvalidToken(_))));
    }

    #[test]
    fn test_parse_json_array_and_lines() {
        let array = r#"[{"id": "a"}, {"id": "b"}]"#;
        assert_eq!(parse_records(array).unwrap().len(), 2);

        let lines = "{\"id\": \"a\"}\n\n{\"id\": \"b\", \"n\": 0.1}\n";
        let records = parse_records(lines).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["n"].as_decimal().unwrap().to_string(), "0.1");
    }

    #[test]
    fn test_shape_routing() {
        let text = r#"[
            {"device_id": "a"},
            {"_shape": "videos", "device_id": "b"},
            {"_shape": "environment", "device_id": "c"}
        ]"#;
        let store = MemoryStore::from_json_text(ShapeKind::Detection, text).unwrap();
        assert_eq!(store.len(ShapeKind::Detection), 1);
        assert_eq!(store.len(ShapeKind::Video), 1);
        assert_eq!(store.len(ShapeKind::EnvironmentalReading), 1);
        assert!(!store.tables[&ShapeKind::Video][0].contains_key(SHAPE_FIELD));

        let bad = r#"{"_shape": "plants"}"#;
        assert!(matches!(
            MemoryStore::from_json_text(ShapeKind::Detection, bad),
            Err(StoreError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(matches!(parse_records("[1, 2]"), Err(StoreError::Malformed(_))));
        assert!(matches!(parse_records("{broken"), Err(StoreError::Malformed(_))));
    }
}
