//! Scalar normalisation
//!
//! Converts single values into the canonical cell text used in CSV output.
//! Sanitisation for spreadsheets happens later, in the export guard; nothing
//! here alters string content.

use crate::model::Value;

/// Converts a record value into an output representation.
///
/// Mirrors the converter strategy used elsewhere in the crate so alternate
/// renderings can be swapped in without touching the flattener.
pub trait CellConverter {
    /// Output type of the conversion
    type Output;

    /// Convert a value to the output type
    fn convert(&self, value: &Value) -> Self::Output;
}

/// Plain text converter used for CSV cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainCellConverter;

impl PlainCellConverter {
    pub fn new() -> Self {
        Self
    }
}

impl CellConverter for PlainCellConverter {
    type Output = String;

    fn convert(&self, value: &Value) -> String {
        normalize(value)
    }
}

/// Canonical cell text for a value.
///
/// - absent → empty
/// - booleans → `true` / `false`
/// - numbers → shortest exact decimal, never scientific
/// - strings → unchanged
/// - sequences and mappings → compact JSON with sorted keys
pub fn normalize(value: &Value) -> String {
    match value {
        Value::Absent => String::new(),
        Value::Boolean(b) => b.to_string(),
        Value::Number(d) => d.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(_) | Value::Mapping(_) => encode_structure(value),
    }
}

/// Compact, stable JSON text for a nested value.
pub fn encode_structure(value: &Value) -> String {
    serde_json::to_string(&value.to_json()).unwrap_or_else(|_| "null".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Decimal;
    use serde_json::json;

    fn num(s: &str) -> Value {
        Value::Number(s.parse::<Decimal>().unwrap())
    }

    #[test]
    fn test_scalars() {
        assert_eq!(normalize(&Value::Absent), "");
        assert_eq!(normalize(&Value::Boolean(true)), "true");
        assert_eq!(normalize(&Value::Boolean(false)), "false");
        assert_eq!(normalize(&Value::from("=SUM(A1)")), "=SUM(A1)");
    }

    #[test]
    fn test_numbers_are_exact() {
        assert_eq!(normalize(&num("0.3")), "0.3");
        assert_eq!(normalize(&num("0.10")), "0.1");
        assert_eq!(normalize(&num("-0.0")), "0");
        assert_eq!(normalize(&num("2.5E+3")), "2500");
    }

    #[test]
    fn test_structures_are_compact_and_sorted() {
        let seq = Value::from(json!([0.9, 0.1]));
        assert_eq!(normalize(&seq), "[0.9,0.1]");

        let map = Value::from(json!({"b": {"y": null, "x": 1}, "a": "t"}));
        assert_eq!(normalize(&map), r#"{"a":"t","b":{"x":1,"y":null}}"#);
    }

    #[test]
    fn test_structure_numbers_stay_exact() {
        let seq = Value::Sequence(vec![num("0.30"), num("1e2")]);
        assert_eq!(normalize(&seq), "[0.3,100]");
    }

    #[test]
    fn test_plain_converter_matches_normalize() {
        let converter = PlainCellConverter::new();
        assert_eq!(converter.convert(&Value::Absent), "");
        assert_eq!(converter.convert(&Value::from(7i64)), "7");
    }
}
