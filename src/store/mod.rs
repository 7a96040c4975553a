//! Record store contract
//!
//! The export pipeline reads records through this minimal paginated query
//! interface. The real store (tables, indexes, credentials) lives elsewhere;
//! all the pipeline needs is "give me the next page after this token".

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

use crate::error::StoreError;
use crate::model::{Record, ShapeKind, Value};

pub mod memory;

pub use memory::{MemoryStore, SHAPE_FIELD};

/// Opaque cursor returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Filters passed through to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilters {
    pub device_id: Option<String>,
    pub start_time: Option<DateTime<FixedOffset>>,
    pub end_time: Option<DateTime<FixedOffset>>,
}

impl QueryFilters {
    /// Whether a record passes these filters.
    ///
    /// With a time range set, records without a parsable `timestamp` are
    /// excluded.
    pub fn matches(&self, record: &Record) -> bool {
        if let Some(device) = &self.device_id {
            if record.get("device_id").and_then(Value::as_str) != Some(device.as_str()) {
                return false;
            }
        }

        if self.start_time.is_none() && self.end_time.is_none() {
            return true;
        }

        let Some(ts) = record
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        else {
            return false;
        };

        self.start_time.is_none_or(|start| ts >= start) && self.end_time.is_none_or(|end| ts <= end)
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<Record>,
    pub next_token: Option<ContinuationToken>,
}

impl Page {
    /// Whether the store signalled more pages. An empty token means no.
    pub fn has_more(&self) -> bool {
        self.next_token.as_ref().is_some_and(|t| !t.is_empty())
    }
}

/// Paginated record source.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the page after `token` (or the first page when `None`).
    ///
    /// # Arguments
    /// * `shape` - Table to query
    /// * `filters` - Device and time filters
    /// * `token` - Continuation token from the previous page
    /// * `page_size` - Maximum number of records to return
    async fn fetch_page(
        &self,
        shape: ShapeKind,
        filters: &QueryFilters,
        token: Option<&ContinuationToken>,
        page_size: usize,
    ) -> Result<Page, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(json: serde_json::Value) -> Record {
        Value::from(json).into_record().unwrap()
    }

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn test_device_filter() {
        let filters = QueryFilters {
            device_id: Some("target-device".into()),
            ..Default::default()
        };
        assert!(filters.matches(&record(json!({"device_id": "target-device"}))));
        assert!(!filters.matches(&record(json!({"device_id": "other"}))));
        assert!(!filters.matches(&record(json!({"id": "no-device"}))));
    }

    #[test]
    fn test_time_range_is_inclusive() {
        let filters = QueryFilters {
            start_time: Some(ts("2023-07-01T00:00:00Z")),
            end_time: Some(ts("2023-07-31T23:59:59Z")),
            ..Default::default()
        };
        assert!(filters.matches(&record(json!({"timestamp": "2023-07-01T00:00:00Z"}))));
        assert!(filters.matches(&record(json!({"timestamp": "2023-07-15T05:30:00-05:00"}))));
        assert!(!filters.matches(&record(json!({"timestamp": "2023-08-01T00:00:00Z"}))));
        assert!(!filters.matches(&record(json!({"timestamp": "yesterday"}))));
    }

    #[test]
    fn test_empty_token_means_no_more() {
        let page = Page {
            records: vec![],
            next_token: Some(ContinuationToken::new("")),
        };
        assert!(!page.has_more());
        assert!(Page {
            records: vec![],
            next_token: Some(ContinuationToken::new("abc")),
        }
        .has_more());
    }
}
