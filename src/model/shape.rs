//! Record shapes
//!
//! Each store table holds one kind of entity. The shape decides which fields
//! carry coordinate semantics and how nested prefixes are named.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Entity type of the records being exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Detection,
    Classification,
    Model,
    Video,
    EnvironmentalReading,
    Device,
}

/// Shape-specific flattening rules.
#[derive(Debug, Clone, Copy)]
pub struct ShapeRules {
    /// Fields holding a `[xmin, ymin, xmax, ymax]` box.
    pub bounding_box_fields: &'static [&'static str],

    /// Fields holding a `{lat, long, alt?}` or `[lat, long, alt?]` position.
    pub geo_fields: &'static [&'static str],

    /// Top-level fields whose nested columns use a shorter prefix.
    pub prefix_aliases: &'static [(&'static str, &'static str)],
}

const GEO_FIELDS: &[&str] = &["location"];
const BOX_FIELDS: &[&str] = &["bounding_box"];

impl ShapeKind {
    /// All shapes, in table order.
    pub const ALL: [ShapeKind; 6] = [
        ShapeKind::Detection,
        ShapeKind::Classification,
        ShapeKind::Model,
        ShapeKind::Video,
        ShapeKind::EnvironmentalReading,
        ShapeKind::Device,
    ];

    /// Name of the table (and export selector) for this shape.
    pub fn table_name(&self) -> &'static str {
        match self {
            ShapeKind::Detection => "detections",
            ShapeKind::Classification => "classifications",
            ShapeKind::Model => "models",
            ShapeKind::Video => "videos",
            ShapeKind::EnvironmentalReading => "environment",
            ShapeKind::Device => "devices",
        }
    }

    /// Flattening rules for this shape.
    pub fn rules(&self) -> ShapeRules {
        match self {
            ShapeKind::Detection => ShapeRules {
                bounding_box_fields: BOX_FIELDS,
                geo_fields: GEO_FIELDS,
                prefix_aliases: &[],
            },
            ShapeKind::Classification => ShapeRules {
                bounding_box_fields: BOX_FIELDS,
                geo_fields: GEO_FIELDS,
                prefix_aliases: &[("classification_data", "classification")],
            },
            ShapeKind::Model
            | ShapeKind::Video
            | ShapeKind::EnvironmentalReading
            | ShapeKind::Device => ShapeRules {
                bounding_box_fields: &[],
                geo_fields: GEO_FIELDS,
                prefix_aliases: &[],
            },
        }
    }

    /// Columns every export of this shape is expected to carry.
    ///
    /// Used as the header skeleton when rows are streamed before the full set
    /// of keys is known.
    pub fn declared_columns(&self) -> &'static [&'static str] {
        match self {
            ShapeKind::Detection => &[
                "device_id",
                "timestamp",
                "model_id",
                "image_key",
                "image_bucket",
                "bbox_xmin",
                "bbox_ymin",
                "bbox_xmax",
                "bbox_ymax",
                "latitude",
                "longitude",
                "altitude",
            ],
            ShapeKind::Classification => &[
                "device_id",
                "timestamp",
                "model_id",
                "image_key",
                "image_bucket",
                "family",
                "genus",
                "species",
                "family_confidence",
                "genus_confidence",
                "species_confidence",
                "bbox_xmin",
                "bbox_ymin",
                "bbox_xmax",
                "bbox_ymax",
                "latitude",
                "longitude",
                "altitude",
                "track_id",
            ],
            ShapeKind::Model => &[
                "id",
                "timestamp",
                "name",
                "type",
                "version",
                "description",
            ],
            ShapeKind::Video => &[
                "device_id",
                "timestamp",
                "video_key",
                "video_bucket",
            ],
            ShapeKind::EnvironmentalReading => &[
                "device_id",
                "timestamp",
                "pm1p0",
                "pm2p5",
                "pm4p0",
                "pm10p0",
                "ambient_temperature",
                "ambient_humidity",
                "voc_index",
                "nox_index",
                "latitude",
                "longitude",
                "altitude",
            ],
            ShapeKind::Device => &["device_id", "created"],
        }
    }
}

impl FromStr for ShapeKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detections" | "detection" => Ok(ShapeKind::Detection),
            "classifications" | "classification" => Ok(ShapeKind::Classification),
            "models" | "model" => Ok(ShapeKind::Model),
            "videos" | "video" => Ok(ShapeKind::Video),
            "environment"
            | "environmental_reading"
            | "environmental_readings"
            | "environmental" => Ok(ShapeKind::EnvironmentalReading),
            "devices" | "device" => Ok(ShapeKind::Device),
            "" => Err(ValidationError::MissingShape),
            _ => Err(ValidationError::InvalidShape(s.to_string())),
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}
