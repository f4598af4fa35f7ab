//! Address extraction from GeoJSON features.
//!
//! A feature becomes at most one [`AddressRecord`]. The street property is
//! mandatory, the house number is optional, and the city is resolved through
//! an ordered list of fallback keys. The geometry contributes one
//! representative vertex:
//!
//! | geometry       | representative vertex                         |
//! |----------------|-----------------------------------------------|
//! | `Point`        | the point                                     |
//! | `LineString`   | first vertex                                  |
//! | `Polygon`      | first vertex of the outer ring                |
//! | `MultiPolygon` | first vertex of the first polygon's outer ring |
//!
//! Every other geometry excludes the feature.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ExtractorConfig;
use crate::geojson::feature::{Feature, Geometry};

/// A postal address with one representative position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub street: String,
    pub house_number: String,
    pub city: String,
    pub lon: f64,
    pub lat: f64,
}

impl AddressRecord {
    /// Create a new address record.
    pub fn new<S: Into<String>>(street: S, house_number: S, city: S, lon: f64, lat: f64) -> Self {
        AddressRecord {
            street: street.into(),
            house_number: house_number.into(),
            city: city.into(),
            lon,
            lat,
        }
    }

    /// The `(street, house_number, city)` triple the store deduplicates on.
    pub fn natural_key(&self) -> (&str, &str, &str) {
        (&self.street, &self.house_number, &self.city)
    }
}

/// A longitude/latitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub fn new(lon: f64, lat: f64) -> Self {
        Coordinate { lon, lat }
    }

    /// Exactly (0, 0).
    pub fn is_null_island(&self) -> bool {
        self.lon == 0.0 && self.lat == 0.0
    }
}

/// Why a feature produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// No street property, or a null one.
    MissingStreet,
    /// The feature had no geometry.
    MissingGeometry,
    /// Geometry kind without a representative vertex.
    UnsupportedGeometry,
    /// Coordinates absent or not nested as the geometry kind requires.
    MissingCoordinate,
    /// Representative vertex at exactly (0, 0).
    NullIsland,
}

impl ExclusionReason {
    /// Every reason, in reporting order.
    pub const ALL: [ExclusionReason; 5] = [
        ExclusionReason::MissingStreet,
        ExclusionReason::MissingGeometry,
        ExclusionReason::UnsupportedGeometry,
        ExclusionReason::MissingCoordinate,
        ExclusionReason::NullIsland,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExclusionReason::MissingStreet => "missing_street",
            ExclusionReason::MissingGeometry => "missing_geometry",
            ExclusionReason::UnsupportedGeometry => "unsupported_geometry",
            ExclusionReason::MissingCoordinate => "missing_coordinate",
            ExclusionReason::NullIsland => "null_island",
        }
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of extracting one feature.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Record(AddressRecord),
    Excluded(ExclusionReason),
}

impl Extraction {
    /// The record, if the feature qualified.
    pub fn into_record(self) -> Option<AddressRecord> {
        match self {
            Extraction::Record(record) => Some(record),
            Extraction::Excluded(_) => None,
        }
    }
}

/// Representative vertex of a geometry, or `None` when the kind has no
/// representative vertex or the payload is not nested as expected.
pub fn representative_coordinate(geometry: &Geometry) -> Option<Coordinate> {
    let depth = geometry.kind.vertex_depth()?;
    vertex_at_depth(&geometry.coordinates, depth)
}

/// Descend `depth` levels through first elements, then read `[lon, lat]`.
fn vertex_at_depth(mut value: &Value, depth: usize) -> Option<Coordinate> {
    for _ in 0..depth {
        value = value.as_array()?.first()?;
    }
    let pair = value.as_array()?;
    let lon = pair.first()?.as_f64()?;
    let lat = pair.get(1)?.as_f64()?;
    Some(Coordinate::new(lon, lat))
}

/// Maps features to address records.
#[derive(Debug, Clone, Default)]
pub struct AddressExtractor {
    config: ExtractorConfig,
}

impl AddressExtractor {
    /// Create an extractor with the given property keys and policy.
    pub fn new(config: ExtractorConfig) -> Self {
        AddressExtractor { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract the address of `feature`, or the reason it has none.
    pub fn extract(&self, feature: &Feature) -> Extraction {
        let props = &feature.properties;

        let Some(street) = props.text(&self.config.street_key) else {
            return Extraction::Excluded(ExclusionReason::MissingStreet);
        };
        let house_number = props
            .text(&self.config.house_number_key)
            .unwrap_or_default();
        let city = self
            .config
            .city_keys
            .iter()
            .find_map(|key| props.text(key))
            .unwrap_or_default();

        let coordinate = match self.coordinate(feature) {
            Ok(coordinate) => coordinate,
            Err(reason) => return Extraction::Excluded(reason),
        };

        Extraction::Record(AddressRecord {
            street,
            house_number,
            city,
            lon: coordinate.lon,
            lat: coordinate.lat,
        })
    }

    fn coordinate(&self, feature: &Feature) -> Result<Coordinate, ExclusionReason> {
        let geometry = feature
            .geometry
            .as_ref()
            .ok_or(ExclusionReason::MissingGeometry)?;
        if geometry.kind.vertex_depth().is_none() {
            return Err(ExclusionReason::UnsupportedGeometry);
        }
        let coordinate =
            representative_coordinate(geometry).ok_or(ExclusionReason::MissingCoordinate)?;
        if self.config.reject_null_island && coordinate.is_null_island() {
            return Err(ExclusionReason::NullIsland);
        }
        Ok(coordinate)
    }
}
