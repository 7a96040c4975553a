//! Loosely typed record values
//!
//! Records arrive from a schemaless store, so every field is one of a small,
//! closed set of shapes. Anything the flattener does not understand still has
//! a well-defined place to go.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;

use super::decimal::Decimal;

/// One record as returned by the store, keyed by field name.
pub type Record = BTreeMap<String, Value>;

/// The flattened, column-keyed text of one record.
pub type FlatRow = BTreeMap<String, String>;

/// A single field value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    #[default]
    Absent,
    Boolean(bool),
    Number(Decimal),
    String(String),
    Sequence(Vec<Value>),
    Mapping(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_decimal(&self) -> Option<&Decimal> {
        match self {
            Value::Number(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Convert a top-level mapping into a [`Record`].
    pub fn into_record(self) -> Option<Record> {
        match self {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Convert to a JSON value, keeping numbers exact.
    ///
    /// Mapping keys come out sorted because `serde_json::Map` is ordered.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Absent => JsonValue::Null,
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Number(d) => {
                let text = d.to_string();
                serde_json::Number::from_str(&text)
                    .map(JsonValue::Number)
                    .unwrap_or(JsonValue::String(text))
            }
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Sequence(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Mapping(map) => JsonValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Absent,
            JsonValue::Bool(b) => Value::Boolean(b),
            JsonValue::Number(n) => {
                // With arbitrary_precision the number keeps its source text.
                let text = n.to_string();
                match text.parse::<Decimal>() {
                    Ok(d) => Value::Number(d),
                    Err(_) => Value::String(text),
                }
            }
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(items) => Value::Sequence(items.into_iter().map(Value::from).collect()),
            JsonValue::Object(map) => {
                Value::Mapping(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        JsonValue::deserialize(deserializer).map(Value::from)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Decimal::from(n))
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Number(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Mapping(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_keeps_decimal_text() {
        let value: Value = serde_json::from_str(r#"{"a": 0.30, "b": 1E+2, "c": null}"#).unwrap();
        let map = value.as_mapping().unwrap();
        assert_eq!(map["a"].as_decimal().unwrap().to_string(), "0.3");
        assert_eq!(map["b"].as_decimal().unwrap().to_string(), "100");
        assert_eq!(map["c"], Value::Absent);
    }

    #[test]
    fn test_to_json_sorts_keys() {
        let value = Value::from(json!({"zeta": 1, "alpha": [true, "x"]}));
        let text = serde_json::to_string(&value.to_json()).unwrap();
        assert_eq!(text, r#"{"alpha":[true,"x"],"zeta":1}"#);
    }

    #[test]
    fn test_into_record_requires_mapping() {
        assert!(Value::from(json!({"id": "x"})).into_record().is_some());
        assert!(Value::from(json!([1, 2])).into_record().is_none());
    }

    #[test]
    fn test_out_of_range_number_becomes_text() {
        let value: Value =
            serde_json::from_str(r#"{"reading": 1e-9223372036854775808, "ok": 2}"#).unwrap();
        let map = value.as_mapping().unwrap();
        match &map["reading"] {
            Value::String(text) => assert!(text.ends_with("9223372036854775808")),
            other => panic!("expected text fallback, got {other:?}"),
        }
        assert_eq!(map["ok"].as_decimal().unwrap().to_string(), "2");
    }
}
