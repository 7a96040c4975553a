//! CSV export
//!
//! This module provides everything between a validated request and CSV bytes:
//! - `request`: raw parameters → validated [`ExportRequest`]
//! - `columns`: header planning over the key superset
//! - `sanitize`: formula-injection guard and RFC 4180 quoting
//! - `writer`: line writer over any async sink
//! - `pipeline`: the paginating export loop
//! - `progress`: optional terminal progress bar

pub mod columns;
pub mod pipeline;
pub mod progress;
pub mod request;
pub mod sanitize;
pub mod writer;

pub use columns::{ColumnPlan, ColumnTracker, DEFAULT_PRIORITY_COLUMNS, plan};
pub use pipeline::{CapReason, ExportOutcome, ExportPipeline, ExportSummary};
pub use progress::ProgressTracker;
pub use request::{
    CONTENT_TYPE, ExportParams, ExportRequest, content_disposition, derive_filename,
    sanitize_filename,
};
pub use sanitize::{FORMULA_TRIGGERS, InjectionGuard, encode_record, sanitize};
pub use writer::{CsvWriter, LINE_TERMINATOR};
