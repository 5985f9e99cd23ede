use crate::core::{bounds::Bounds, constants::GEOMETRY_KEY, geo::project_geometry_from_lon_lat};
use geo::BoundingRect;
use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered attribute record. Values are scalars: string, number or null.
pub type Attributes = serde_json::Map<String, Value>;

/// Identifier of a feature, stable within its source layer for the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId(pub String);

impl FeatureId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FeatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeatureId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Coarse geometry family, used to check symbology support and the
/// polygon-only rules of the statistics engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Point,
    Line,
    Polygon,
    Other,
}

impl GeometryKind {
    pub fn of(geometry: &Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(_) | Geometry::MultiPoint(_) => GeometryKind::Point,
            Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
                GeometryKind::Line
            }
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
                GeometryKind::Polygon
            }
            Geometry::GeometryCollection(_) => GeometryKind::Other,
        }
    }
}

/// A single geometry plus attributes, owned by exactly one layer.
///
/// Geometry is always in the map's working projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: FeatureId,
    pub geometry: Geometry<f64>,
    pub attributes: Attributes,
}

impl Feature {
    pub fn new(id: impl Into<String>, geometry: Geometry<f64>, attributes: Attributes) -> Self {
        Self {
            id: FeatureId::new(id),
            geometry,
            attributes: sanitize_attributes(attributes),
        }
    }

    pub fn attribute(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// Finite numeric value of `field`. Numeric strings are accepted, the way
    /// WFS servers often deliver numbers; anything non-finite is `None`.
    pub fn numeric(&self, field: &str) -> Option<f64> {
        numeric_value(self.attributes.get(field)?)
    }

    pub fn kind(&self) -> GeometryKind {
        GeometryKind::of(&self.geometry)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.geometry.bounding_rect().map(|rect| Bounds::from_rect(&rect))
    }
}

/// Finite `f64` view of a scalar attribute value.
pub fn numeric_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Keeps attributes scalar: drops the geometry key, flattens nested values to
/// their JSON text and booleans to `"true"`/`"false"`.
pub fn sanitize_attributes(attributes: Attributes) -> Attributes {
    attributes
        .into_iter()
        .filter(|(key, _)| key != GEOMETRY_KEY)
        .map(|(key, value)| {
            let value = match value {
                Value::Bool(b) => Value::String(b.to_string()),
                Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
                scalar => scalar,
            };
            (key, value)
        })
        .collect()
}

/// Collection of features
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn get(&self, id: &FeatureId) -> Option<&Feature> {
        self.features.iter().find(|f| &f.id == id)
    }

    /// Combined extent of every feature, `None` when empty
    pub fn extent(&self) -> Option<Bounds> {
        let mut extent: Option<Bounds> = None;
        for bounds in self.features.iter().filter_map(Feature::bounds) {
            match extent.as_mut() {
                Some(e) => e.extend_bounds(&bounds),
                None => extent = Some(bounds),
            }
        }
        extent
    }

    /// Geometry kinds present, in first-seen order
    pub fn kinds(&self) -> Vec<GeometryKind> {
        let mut kinds = Vec::new();
        for kind in self.features.iter().map(Feature::kind) {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        kinds
    }

    /// Reprojects every geometry from lon/lat into the map projection.
    pub fn project_from_lon_lat(mut self) -> Self {
        for feature in &mut self.features {
            feature.geometry = project_geometry_from_lon_lat(&feature.geometry);
        }
        self
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_geometry_key_is_never_an_attribute() {
        let feature = Feature::new(
            "f1",
            Geometry::Point(geo_types::Point::new(0.0, 0.0)),
            attrs(json!({"name": "a", "geometry": "POINT(0 0)"})),
        );
        assert!(feature.attribute("geometry").is_none());
        assert_eq!(feature.attribute("name"), Some(&json!("a")));
    }

    #[test]
    fn test_numeric_accepts_numeric_strings_and_rejects_garbage() {
        let feature = Feature::new(
            "f1",
            Geometry::Point(geo_types::Point::new(0.0, 0.0)),
            attrs(json!({"a": 3.5, "b": " 12 ", "c": "n/a", "d": null, "e": "NaN"})),
        );
        assert_eq!(feature.numeric("a"), Some(3.5));
        assert_eq!(feature.numeric("b"), Some(12.0));
        assert_eq!(feature.numeric("c"), None);
        assert_eq!(feature.numeric("d"), None);
        assert_eq!(feature.numeric("e"), None);
        assert_eq!(feature.numeric("missing"), None);
    }

    #[test]
    fn test_attributes_keep_insertion_order_and_flatten_nested() {
        let feature = Feature::new(
            "f1",
            Geometry::Point(geo_types::Point::new(0.0, 0.0)),
            attrs(json!({"zeta": 1, "alpha": true, "mid": {"k": 1}})),
        );
        let keys: Vec<&String> = feature.attributes.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(feature.attribute("alpha"), Some(&json!("true")));
        assert_eq!(feature.attribute("mid"), Some(&json!("{\"k\":1}")));
    }

    #[test]
    fn test_extent_spans_all_features() {
        let collection: FeatureCollection = vec![
            Feature::new("a", Geometry::Point(geo_types::Point::new(0.0, 0.0)), Attributes::new()),
            Feature::new("b", Geometry::Point(geo_types::Point::new(4.0, -2.0)), Attributes::new()),
        ]
        .into_iter()
        .collect();
        assert_eq!(collection.extent(), Some(Bounds::from_coords(0.0, -2.0, 4.0, 0.0)));
    }
}
