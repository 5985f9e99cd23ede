//! GeoJSON wire types and conversion into engine features.
//!
//! WFS responses arrive already in the map projection (we request
//! `srsname=EPSG:3857`), uploads arrive in lon/lat; [`SourceCrs`] tells the
//! reader which one it is looking at.

use crate::{
    data::feature::{Attributes, Feature, FeatureCollection},
    MapError, Result,
};
use geo_types::{Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type Position = Vec<f64>;

/// GeoJSON geometry objects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeoJsonGeometry {
    Point { coordinates: Position },
    LineString { coordinates: Vec<Position> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPoint { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<GeoJsonGeometry> },
}

/// GeoJSON feature with geometry and properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoJsonFeature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default)]
    pub geometry: Option<GeoJsonGeometry>,
    #[serde(default)]
    pub properties: Option<Attributes>,
}

/// Coordinate reference of an incoming payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCrs {
    /// EPSG:4326 `[lon, lat]` positions
    LonLat,
    /// Already in the map projection
    Map,
}

/// Parses a GeoJSON document (FeatureCollection, Feature or bare geometry).
///
/// Features without geometry are skipped. Missing ids become `<prefix>#<n>`.
/// Any malformed geometry fails the whole payload.
pub fn parse_features(text: &str, id_prefix: &str, crs: SourceCrs) -> Result<FeatureCollection> {
    let root: Value = serde_json::from_str(text)
        .map_err(|e| MapError::Parse(format!("invalid JSON: {}", e)))?;
    features_from_value(root, id_prefix, crs)
}

pub fn features_from_value(root: Value, id_prefix: &str, crs: SourceCrs) -> Result<FeatureCollection> {
    let kind = root
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| MapError::Parse("GeoJSON object has no \"type\"".into()))?
        .to_string();

    let raw: Vec<GeoJsonFeature> = match kind.as_str() {
        "FeatureCollection" => {
            let features = root
                .get("features")
                .cloned()
                .ok_or_else(|| MapError::Parse("FeatureCollection without \"features\"".into()))?;
            serde_json::from_value(features)
                .map_err(|e| MapError::Parse(format!("invalid feature: {}", e)))?
        }
        "Feature" => vec![serde_json::from_value(root)
            .map_err(|e| MapError::Parse(format!("invalid feature: {}", e)))?],
        _ => {
            let geometry: GeoJsonGeometry = serde_json::from_value(root)
                .map_err(|e| MapError::Parse(format!("unsupported GeoJSON type {}: {}", kind, e)))?;
            vec![GeoJsonFeature {
                id: None,
                geometry: Some(geometry),
                properties: None,
            }]
        }
    };

    let mut features = Vec::with_capacity(raw.len());
    for (index, feature) in raw.into_iter().enumerate() {
        let Some(geometry) = feature.geometry.as_ref() else {
            log::debug!("skipping feature {} of {} without geometry", index, id_prefix);
            continue;
        };
        let geometry = to_geometry(geometry)?;
        let id = match &feature.id {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => format!("{}#{}", id_prefix, index),
        };
        features.push(Feature::new(id, geometry, feature.properties.unwrap_or_default()));
    }

    let collection = FeatureCollection::new(features);
    Ok(match crs {
        SourceCrs::LonLat => collection.project_from_lon_lat(),
        SourceCrs::Map => collection,
    })
}

fn coord(position: &[f64]) -> Result<Coord<f64>> {
    match position {
        [x, y, ..] if x.is_finite() && y.is_finite() => Ok(Coord { x: *x, y: *y }),
        _ => Err(MapError::Parse(format!("invalid position {:?}", position))),
    }
}

fn line(positions: &[Position]) -> Result<LineString<f64>> {
    if positions.len() < 2 {
        return Err(MapError::Parse("line needs at least two positions".into()));
    }
    positions
        .iter()
        .map(|p| coord(p))
        .collect::<Result<Vec<_>>>()
        .map(LineString::new)
}

fn polygon(rings: &[Vec<Position>]) -> Result<Polygon<f64>> {
    let (exterior, interiors) = rings
        .split_first()
        .ok_or_else(|| MapError::Parse("polygon without rings".into()))?;
    if exterior.len() < 4 {
        return Err(MapError::Parse("polygon ring needs at least four positions".into()));
    }
    let interiors = interiors.iter().map(|r| line(r)).collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(line(exterior)?, interiors))
}

/// Converts a wire geometry into a `geo_types` geometry, without reprojecting.
pub fn to_geometry(geometry: &GeoJsonGeometry) -> Result<Geometry<f64>> {
    Ok(match geometry {
        GeoJsonGeometry::Point { coordinates } => Geometry::Point(coord(coordinates)?.into()),
        GeoJsonGeometry::LineString { coordinates } => Geometry::LineString(line(coordinates)?),
        GeoJsonGeometry::Polygon { coordinates } => Geometry::Polygon(polygon(coordinates)?),
        GeoJsonGeometry::MultiPoint { coordinates } => Geometry::MultiPoint(MultiPoint::new(
            coordinates
                .iter()
                .map(|p| coord(p).map(Into::into))
                .collect::<Result<Vec<_>>>()?,
        )),
        GeoJsonGeometry::MultiLineString { coordinates } => Geometry::MultiLineString(
            MultiLineString::new(coordinates.iter().map(|l| line(l)).collect::<Result<Vec<_>>>()?),
        ),
        GeoJsonGeometry::MultiPolygon { coordinates } => Geometry::MultiPolygon(MultiPolygon::new(
            coordinates.iter().map(|p| polygon(p)).collect::<Result<Vec<_>>>()?,
        )),
        GeoJsonGeometry::GeometryCollection { geometries } => {
            Geometry::GeometryCollection(GeometryCollection::from(
                geometries.iter().map(to_geometry).collect::<Result<Vec<_>>>()?,
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::feature::GeometryKind;

    const RIVERS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "id": "rios.1",
             "geometry": {"type": "LineString", "coordinates": [[0, 0], [10, 10]]},
             "properties": {"nombre": "Salado", "caudal": 120.5}},
            {"type": "Feature",
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[4,0],[4,4],[0,4],[0,0]]]},
             "properties": null},
            {"type": "Feature", "geometry": null, "properties": {"nombre": "ghost"}}
        ]
    }"#;

    #[test]
    fn test_feature_collection_in_map_projection() {
        let collection = parse_features(RIVERS, "rios", SourceCrs::Map).unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.features[0].id.as_str(), "rios.1");
        assert_eq!(collection.features[1].id.as_str(), "rios#1");
        assert_eq!(collection.features[0].numeric("caudal"), Some(120.5));
        assert_eq!(collection.features[1].kind(), GeometryKind::Polygon);
        assert!(collection.features[1].attributes.is_empty());
    }

    #[test]
    fn test_lon_lat_payload_is_projected() {
        let text = r#"{"type": "Point", "coordinates": [180.0, 0.0]}"#;
        let collection = parse_features(text, "upload", SourceCrs::LonLat).unwrap();
        match &collection.features[0].geometry {
            Geometry::Point(p) => {
                assert!((p.x() - crate::core::geo::MERCATOR_HALF_WORLD).abs() < 1e-6);
                assert!(p.y().abs() < 1e-6);
            }
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_malformed_geometry_fails_whole_payload() {
        let text = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1]}, "properties": {}}
        ]}"#;
        assert!(matches!(
            parse_features(text, "bad", SourceCrs::Map),
            Err(MapError::Parse(_))
        ));
    }

    #[test]
    fn test_numeric_ids_are_stringified() {
        let text = r#"{"type": "Feature", "id": 42,
            "geometry": {"type": "Point", "coordinates": [1, 2]}, "properties": {}}"#;
        let collection = parse_features(text, "x", SourceCrs::Map).unwrap();
        assert_eq!(collection.features[0].id.as_str(), "42");
    }
}
