//! GeoJSON feature data model.
//!
//! Only what the extractor needs is modelled: the property bag and the
//! geometry type with its raw coordinate payload. Anything else in a feature
//! object is ignored during deserialization.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One feature of the input collection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Feature {
    /// Open key/value bag. `null` and a missing member both read as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Properties,

    /// `null` geometries are legal GeoJSON.
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

impl Feature {
    /// Build a feature from parts.
    pub fn new(properties: Properties, geometry: Option<Geometry>) -> Self {
        Feature {
            properties,
            geometry,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Properties, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Properties>::deserialize(deserializer)?.unwrap_or_default())
}

/// Typed lookup over a feature's properties.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Properties(HashMap<String, PropertyValue>);

impl Properties {
    /// Build a property bag from key/value pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, PropertyValue)>,
        K: Into<String>,
    {
        Properties(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key)
    }

    /// Canonical string for `key`, or `None` when the key is absent or null.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key) {
            None | Some(PropertyValue::Null) => None,
            Some(value) => Some(value.normalize()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A loosely typed property value.
///
/// Variant order matters for the untagged representation: `null` must be
/// tried before anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    /// Arrays and objects. Not expected in address tags but tolerated.
    Other(Value),
}

impl PropertyValue {
    /// Canonical string form used for every extracted column.
    ///
    /// Text is taken verbatim, numbers use their default JSON formatting,
    /// booleans print as `true`/`false`, null becomes the empty string and
    /// nested values are re-serialized as compact JSON.
    pub fn normalize(&self) -> String {
        match self {
            PropertyValue::Null => String::new(),
            PropertyValue::Bool(b) => b.to_string(),
            PropertyValue::Number(n) => n.to_string(),
            PropertyValue::Text(s) => s.clone(),
            PropertyValue::Other(v) => v.to_string(),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        PropertyValue::Number(n.into())
    }
}

/// GeoJSON geometry kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryType {
    Point,
    MultiPoint,
    LineString,
    MultiLineString,
    Polygon,
    MultiPolygon,
    GeometryCollection,
    #[serde(other)]
    Unknown,
}

impl GeometryType {
    /// How many array levels wrap the representative `[lon, lat]` pair.
    ///
    /// `None` for kinds without a representative vertex.
    pub fn vertex_depth(self) -> Option<usize> {
        match self {
            GeometryType::Point => Some(0),
            GeometryType::LineString => Some(1),
            GeometryType::Polygon => Some(2),
            GeometryType::MultiPolygon => Some(3),
            _ => None,
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Geometry type plus its coordinate payload, kept as raw JSON until the
/// extractor decides how deep to look.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: GeometryType,

    #[serde(default)]
    pub coordinates: Value,
}

impl Geometry {
    /// Build a geometry from a kind and a coordinate payload.
    pub fn new(kind: GeometryType, coordinates: Value) -> Self {
        Geometry { kind, coordinates }
    }
}
