//! Record flattening
//!
//! This module turns nested store records into flat rows:
//! - `normalizer`: single value → canonical cell text
//! - `flattener`: whole record → column-keyed row, using shape rules
//!
//! # Example
//!
//! ```rust
//! use garden_export::flatten::flatten;
//! use garden_export::model::{ShapeKind, Value};
//! use serde_json::json;
//!
//! let record = Value::from(json!({
//!     "device_id": "garden-01",
//!     "bounding_box": [10, 20, 30, 40],
//! }))
//! .into_record()
//! .unwrap();
//!
//! let row = flatten(&record, ShapeKind::Detection);
//! assert_eq!(row["bbox_xmax"], "30");
//! ```

mod flattener;
mod normalizer;

pub use flattener::{FlattenOptions, Flattened, Flattener, flatten};
pub use normalizer::{CellConverter, PlainCellConverter, encode_structure, normalize};

#[cfg(test)]
mod tests;
