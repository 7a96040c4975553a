//! Export request validation
//!
//! Raw caller input arrives as optional strings. Validation happens once,
//! up front, so a run never starts writing before discovering a bad
//! parameter.

use chrono::{DateTime, FixedOffset, Utc};

use crate::config::ExportConfig;
use crate::error::{Result, ValidationError};
use crate::model::ShapeKind;
use crate::store::QueryFilters;

/// MIME type of the export body.
pub const CONTENT_TYPE: &str = "text/csv";

/// Unvalidated export parameters as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportParams {
    pub table: Option<String>,
    pub device_id: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub limit: Option<String>,
    pub filename: Option<String>,
    /// Comma-separated column override
    pub columns: Option<String>,
}

/// A validated export request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub shape: ShapeKind,
    pub filters: QueryFilters,
    pub limit: u64,
    pub filename: String,
    /// Replaces the configured priority prefix when set
    pub column_override: Option<Vec<String>>,
}

impl ExportRequest {
    /// Request with default limit and derived filename.
    pub fn new(shape: ShapeKind, config: &ExportConfig) -> Self {
        Self {
            shape,
            filters: QueryFilters::default(),
            limit: config.default_limit,
            filename: derive_filename(shape, Utc::now()),
            column_override: None,
        }
    }

    /// Validate raw parameters against the configured limits.
    pub fn from_params(params: &ExportParams, config: &ExportConfig) -> Result<Self> {
        let shape: ShapeKind = params
            .table
            .as_deref()
            .ok_or(ValidationError::MissingShape)?
            .parse()?;

        let start_time = parse_time("start_time", params.start_time.as_deref())?;
        let end_time = parse_time("end_time", params.end_time.as_deref())?;
        if let (Some(start), Some(end)) = (start_time, end_time) {
            if start > end {
                return Err(ValidationError::InvertedRange {
                    start: start.to_rfc3339(),
                    end: end.to_rfc3339(),
                }
                .into());
            }
        }

        let limit = parse_limit(params.limit.as_deref(), config)?;

        let filename = match non_blank(params.filename.as_deref()) {
            Some(name) => sanitize_filename(name),
            None => derive_filename(shape, Utc::now()),
        };

        let column_override = params
            .columns
            .as_deref()
            .map(parse_columns)
            .transpose()?;

        Ok(Self {
            shape,
            filters: QueryFilters {
                device_id: non_blank(params.device_id.as_deref()).map(str::to_string),
                start_time,
                end_time,
            },
            limit,
            filename,
            column_override,
        })
    }

    pub fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }

    pub fn content_disposition(&self) -> String {
        content_disposition(&self.filename)
    }

    /// Human-readable bounds of the time range, used in the empty notice.
    pub fn range_label(&self) -> (String, String) {
        let label = |t: Option<DateTime<FixedOffset>>| {
            t.map(|t| t.to_rfc3339()).unwrap_or_else(|| "any time".to_string())
        };
        (label(self.filters.start_time), label(self.filters.end_time))
    }
}

/// `attachment; filename="<name>"`
pub fn content_disposition(filename: &str) -> String {
    format!("attachment; filename=\"{filename}\"")
}

/// Replace everything outside `[A-Za-z0-9._-]` with `_` and make sure the
/// name ends in `.csv`.
pub fn sanitize_filename(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if !out.to_ascii_lowercase().ends_with(".csv") {
        out.push_str(".csv");
    }
    out
}

/// `<table>_export_<YYYYMMDDTHHMMSSZ>.csv`
pub fn derive_filename(shape: ShapeKind, now: DateTime<Utc>) -> String {
    format!(
        "{}_export_{}.csv",
        shape.table_name(),
        now.format("%Y%m%dT%H%M%SZ")
    )
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_time(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<DateTime<FixedOffset>>> {
    let Some(value) = non_blank(value) else {
        return Ok(None);
    };

    DateTime::parse_from_rfc3339(value)
        .map(Some)
        .map_err(|_| {
            ValidationError::InvalidDate {
                field,
                value: value.to_string(),
            }
            .into()
        })
}

fn parse_limit(value: Option<&str>, config: &ExportConfig) -> Result<u64> {
    let Some(raw) = non_blank(value) else {
        return Ok(config.default_limit);
    };

    match raw.parse::<u64>() {
        Ok(n) if (1..=config.max_limit).contains(&n) => Ok(n),
        _ => Err(ValidationError::InvalidLimit {
            value: raw.to_string(),
            max: config.max_limit,
        }
        .into()),
    }
}

fn parse_columns(raw: &str) -> Result<Vec<String>> {
    let columns: Vec<String> = raw.split(',').map(|c| c.trim().to_string()).collect();

    if columns.iter().any(String::is_empty) {
        return Err(ValidationError::InvalidColumns(format!(
            "blank column name in '{raw}'"
        ))
        .into());
    }
    Ok(columns)
}
