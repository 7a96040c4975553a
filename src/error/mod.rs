//! Error handling for export operations.
//!
//! Errors are split by where they originate:
//! - Request validation (bad shape, dates, limits) is raised before any output
//! - Store failures abort the current export
//! - Configuration problems surface at startup
//!
//! Per-record malformation is never an error; the flattener recovers locally
//! and only counts it.
//!
//! # Example
//!
//! ```rust
//! use garden_export::error::{ExportError, ValidationError};
//!
//! let err: ExportError = ValidationError::InvalidShape("tables".into()).into();
//! assert!(err.is_validation());
//! ```

pub mod kinds;

pub use kinds::{ConfigError, ExportError, Result, StoreError, ValidationError};
