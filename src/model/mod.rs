//! Data model for exported records
//!
//! - `Value` / `Record`: what the store hands us
//! - `Decimal`: exact numbers, never routed through `f64`
//! - `FlatRow`: one record after flattening
//! - `ShapeKind`: which table the records came from

mod decimal;
mod shape;
mod value;

pub use decimal::{Decimal, ParseDecimalError};
pub use shape::{ShapeKind, ShapeRules};
pub use value::{FlatRow, Record, Value};
