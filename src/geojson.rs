//! GeoJSON input: the feature model and a streaming decoder for feature
//! collections.

pub mod decoder;
pub mod feature;

pub use decoder::{DecodedFeature, FeatureStream};
pub use feature::{Feature, Geometry, GeometryType, Properties, PropertyValue};
