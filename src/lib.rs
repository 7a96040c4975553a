//! Sensing-garden CSV export library
//!
//! Turns nested sensing-garden records (detections, classifications, models,
//! videos, environmental readings, devices) into flat, spreadsheet-safe CSV.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `export`: Request validation, column planning, CSV writing and the export pipeline
//! - `flatten`: Record flattening
//! - `model`: Values, decimals and record shapes
//! - `store`: Paginated record store contract and an in-memory store
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use garden_export::config::Config;
//! use garden_export::export::{ExportParams, ExportPipeline, ExportRequest, ProgressTracker};
//! use garden_export::model::ShapeKind;
//! use garden_export::store::MemoryStore;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let store = MemoryStore::from_json_text(
//!         ShapeKind::Detection,
//!         r#"[{"device_id": "garden-01", "bounding_box": [1, 2, 3, 4]}]"#,
//!     )?;
//!
//!     let params = ExportParams {
//!         table: Some("detections".into()),
//!         ..Default::default()
//!     };
//!     let request = ExportRequest::from_params(&params, &config.export)?;
//!
//!     let pipeline = ExportPipeline::new(Arc::new(store), &config);
//!     let summary = pipeline
//!         .run(&request, tokio::io::stdout(), CancellationToken::new(), &ProgressTracker::disabled())
//!         .await?;
//!     eprintln!("{summary}");
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod flatten;
pub mod model;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use error::{ExportError, Result};
pub use export::{ExportOutcome, ExportPipeline, ExportRequest, ExportSummary};
pub use flatten::{Flattener, flatten};
pub use model::{Record, ShapeKind, Value};
pub use store::{MemoryStore, RecordStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
