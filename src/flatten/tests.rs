//! Tests for record flattening

use super::*;
use crate::model::{Decimal, Record, ShapeKind, Value};
use proptest::prelude::*;
use serde_json::json;

fn record(json: serde_json::Value) -> Record {
    Value::from(json).into_record().unwrap()
}

// ===== Coordinate Fields =====

#[test]
fn test_bounding_box_expands() {
    let row = flatten(
        &record(json!({"device_id": "d1", "bounding_box": [10, 20.5, 30, 40]})),
        ShapeKind::Detection,
    );

    assert_eq!(row["bbox_xmin"], "10");
    assert_eq!(row["bbox_ymin"], "20.5");
    assert_eq!(row["bbox_xmax"], "30");
    assert_eq!(row["bbox_ymax"], "40");
    assert!(!row.contains_key("bounding_box"));
}

#[test]
fn test_bounding_box_wrong_type_falls_back() {
    let flattener = Flattener::new(ShapeKind::Detection, FlattenOptions::default());
    let out = flattener.flatten_with_diagnostics(&record(json!({
        "device_id": "d1",
        "timestamp": "2023-07-15T10:30:00Z",
        "bounding_box": "not-an-array",
    })));

    assert_eq!(out.malformed, 1);
    assert_eq!(out.row["bounding_box"], "not-an-array");
    assert_eq!(out.row["device_id"], "d1");
    assert_eq!(out.row["timestamp"], "2023-07-15T10:30:00Z");
    assert!(!out.row.contains_key("bbox_xmin"));
}

#[test]
fn test_bounding_box_wrong_arity_falls_back() {
    let flattener = Flattener::new(ShapeKind::Classification, FlattenOptions::default());
    let out = flattener.flatten_with_diagnostics(&record(json!({"bounding_box": [1, 2, 3]})));

    assert_eq!(out.malformed, 1);
    assert_eq!(out.row["bounding_box"], "[1,2,3]");
}

#[test]
fn test_bounding_box_is_plain_field_for_models() {
    let row = flatten(&record(json!({"bounding_box": [1, 2, 3, 4]})), ShapeKind::Model);
    assert_eq!(row["bounding_box"], "[1,2,3,4]");
}

#[test]
fn test_location_with_and_without_altitude() {
    let with_alt = flatten(
        &record(json!({"location": {"lat": 40.7128, "long": -74.0060, "alt": 10.5}})),
        ShapeKind::Classification,
    );
    assert_eq!(with_alt["latitude"], "40.7128");
    assert_eq!(with_alt["longitude"], "-74.006");
    assert_eq!(with_alt["altitude"], "10.5");

    let without_alt = flatten(
        &record(json!({"location": {"lat": 40.7128, "long": -74.0060}})),
        ShapeKind::Classification,
    );
    assert!(!without_alt.contains_key("altitude"));
    assert_eq!(without_alt.len(), 2);
}

#[test]
fn test_location_sequence_form() {
    let row = flatten(
        &record(json!({"location": [51.5, -0.12]})),
        ShapeKind::EnvironmentalReading,
    );
    assert_eq!(row["latitude"], "51.5");
    assert_eq!(row["longitude"], "-0.12");
    assert!(!row.contains_key("altitude"));
}

#[test]
fn test_location_missing_long_falls_back() {
    let flattener = Flattener::new(ShapeKind::Device, FlattenOptions::default());
    let out = flattener.flatten_with_diagnostics(&record(json!({"location": {"lat": 1}})));

    assert_eq!(out.malformed, 1);
    assert_eq!(out.row["location"], r#"{"lat":1}"#);
}

#[test]
fn test_location_extra_keys_are_kept() {
    let row = flatten(
        &record(json!({"location": {"lat": 1, "long": 2, "accuracy": 5}})),
        ShapeKind::Video,
    );
    assert_eq!(row["location_accuracy"], "5");
}

#[test]
fn test_null_coordinate_field_is_skipped() {
    let flattener = Flattener::new(ShapeKind::Detection, FlattenOptions::default());
    let out = flattener.flatten_with_diagnostics(&record(json!({"bounding_box": null, "id": "x"})));

    assert_eq!(out.malformed, 0);
    assert_eq!(out.row.len(), 1);
}

// ===== Ranked Alternatives =====

#[test]
fn test_classification_data_candidates() {
    let row = flatten(
        &record(json!({
            "classification_data": {
                "family": [
                    {"name": "Nymphalidae", "confidence": 0.95},
                    {"name": "Pieridae", "confidence": 0.05}
                ],
                "genus": [{"name": "Vanessa", "confidence": 0.87}]
            }
        })),
        ShapeKind::Classification,
    );

    assert_eq!(row["classification_family_count"], "2");
    assert_eq!(row["classification_family_1_name"], "Nymphalidae");
    assert_eq!(row["classification_family_1_confidence"], "0.95");
    assert_eq!(row["classification_family_2_name"], "Pieridae");
    assert_eq!(row["classification_family_2_confidence"], "0.05");
    assert_eq!(row["classification_genus_count"], "1");
    assert_eq!(row["classification_genus_1_name"], "Vanessa");
}

#[test]
fn test_ranked_alternatives_are_uncapped_by_default() {
    let candidates: Vec<_> = (0..12)
        .map(|i| json!({"name": format!("taxon-{i}"), "confidence": 0.01}))
        .collect();
    let row = flatten(
        &record(json!({"classification_data": {"species": candidates}})),
        ShapeKind::Classification,
    );

    assert_eq!(row["classification_species_count"], "12");
    assert_eq!(row["classification_species_12_name"], "taxon-11");
}

#[test]
fn test_ranked_alternatives_cap() {
    let options = FlattenOptions {
        max_ranked_alternatives: Some(3),
    };
    let candidates: Vec<_> = (0..5)
        .map(|i| json!({"name": format!("t{i}"), "confidence": 0.2}))
        .collect();
    let row = Flattener::new(ShapeKind::Classification, options)
        .flatten(&record(json!({"classification_data": {"family": candidates}})));

    assert_eq!(row["classification_family_count"], "5");
    assert!(row.contains_key("classification_family_3_name"));
    assert!(!row.contains_key("classification_family_4_name"));
}

#[test]
fn test_classification_prefix_alias_only_for_classifications() {
    let data = json!({"classification_data": {"family": [{"name": "A", "confidence": 1}]}});
    let row = flatten(&record(data), ShapeKind::Model);
    assert!(row.contains_key("classification_data_family_1_name"));
}

#[test]
fn test_mixed_sequence_is_encoded() {
    let row = flatten(
        &record(json!({"candidates": [{"name": "A", "confidence": 1}, "B"]})),
        ShapeKind::Classification,
    );
    assert_eq!(row["candidates"], r#"[{"confidence":1,"name":"A"},"B"]"#);
}

// ===== Nested Mappings and Scalars =====

#[test]
fn test_metadata_recurses_at_any_depth() {
    let row = flatten(
        &record(json!({
            "metadata": {
                "camera_model": "RaspberryPi Camera v2",
                "settings": {"iso": 100, "exposure": {"auto": true}},
                "tags": ["a", "b"],
                "empty": {}
            }
        })),
        ShapeKind::Video,
    );

    assert_eq!(row["metadata_camera_model"], "RaspberryPi Camera v2");
    assert_eq!(row["metadata_settings_iso"], "100");
    assert_eq!(row["metadata_settings_exposure_auto"], "true");
    assert_eq!(row["metadata_tags"], r#"["a","b"]"#);
    assert_eq!(row["metadata_empty"], "{}");
}

#[test]
fn test_confidence_array_stays_one_column() {
    let row = flatten(
        &record(json!({"family_confidence_array": [0.9, 0.1]})),
        ShapeKind::Classification,
    );
    assert_eq!(row["family_confidence_array"], "[0.9,0.1]");
}

#[test]
fn test_exact_decimal_cells() {
    let mut rec = Record::new();
    rec.insert("pm2p5".into(), Value::Number("0.30".parse::<Decimal>().unwrap()));
    rec.insert("zero".into(), Value::Number("-0.0".parse::<Decimal>().unwrap()));
    rec.insert("flag".into(), Value::Boolean(false));
    rec.insert("missing".into(), Value::Absent);

    let row = flatten(&rec, ShapeKind::EnvironmentalReading);
    assert_eq!(row["pm2p5"], "0.3");
    assert_eq!(row["zero"], "0");
    assert_eq!(row["flag"], "false");
    assert_eq!(row["missing"], "");
}

#[test]
fn test_column_collision_keeps_first() {
    let flattener = Flattener::new(ShapeKind::Detection, FlattenOptions::default());
    let out = flattener.flatten_with_diagnostics(&record(json!({
        "bbox_xmin": "literal",
        "bounding_box": [1, 2, 3, 4],
    })));

    assert_eq!(out.row["bbox_xmin"], "literal");
    assert_eq!(out.row["bbox_ymin"], "2");
    assert_eq!(out.malformed, 1);
}

// ===== Determinism =====

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Absent),
        any::<bool>().prop_map(Value::Boolean),
        (any::<i64>(), 0u32..6).prop_map(|(n, scale)| {
            let text = format!("{n}e-{scale}");
            Value::Number(text.parse::<Decimal>().unwrap())
        }),
        "[ -~]{0,12}".prop_map(Value::String),
    ];

    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(Value::Sequence),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..5).prop_map(Value::Mapping),
        ]
    })
}

fn arb_record() -> impl Strategy<Value = Record> {
    prop::collection::btree_map(
        prop_oneof![
            Just("bounding_box".to_string()),
            Just("location".to_string()),
            Just("classification_data".to_string()),
            "[a-z_]{1,10}",
        ],
        arb_value(),
        0..8,
    )
}

fn arb_shape() -> impl Strategy<Value = ShapeKind> {
    prop::sample::select(ShapeKind::ALL.to_vec())
}

proptest! {
    #[test]
    fn test_flatten_is_deterministic(rec in arb_record(), shape in arb_shape()) {
        let first = flatten(&rec, shape);
        let second = flatten(&rec.clone(), shape);

        prop_assert_eq!(&first, &second);
        let first_keys: Vec<_> = first.keys().collect();
        let second_keys: Vec<_> = second.keys().collect();
        prop_assert_eq!(first_keys, second_keys);
    }

    #[test]
    fn test_every_field_leaves_a_trace(rec in arb_record(), shape in arb_shape()) {
        // Flattening never aborts: each non-null top-level field yields at
        // least one column.
        let row = flatten(&rec, shape);
        let present = rec.values().filter(|v| !matches!(v, Value::Absent)).count();
        prop_assert!(present == 0 || !row.is_empty());
    }
}
