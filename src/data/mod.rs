pub mod feature;
pub mod formats;
pub mod geojson;
pub mod osm;

pub use feature::{Attributes, Feature, FeatureCollection, FeatureId, GeometryKind};
pub use formats::{DataFormat, DataProcessor};
