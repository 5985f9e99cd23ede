//! Overpass (`out geom;`) OSM JSON into features.
//!
//! Tagged nodes become points, ways become lines or polygons depending on
//! whether they are closed and carry an area tag, and multipolygon relations
//! are assembled from their outer/inner member ways.

use crate::{
    data::feature::{Attributes, Feature, FeatureCollection},
    MapError, Result,
};
use geo::Contains;
use geo_types::{Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Tag keys whose closed ways are areas unless `area=no`
const AREA_KEYS: &[&str] = &[
    "building", "landuse", "leisure", "amenity", "natural", "water", "place", "boundary",
];

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    elements: Vec<OsmElement>,
}

#[derive(Debug, Deserialize)]
struct LatLon {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OsmMember {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    geometry: Vec<LatLon>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum OsmElement {
    Node {
        id: i64,
        lat: f64,
        lon: f64,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    Way {
        id: i64,
        #[serde(default)]
        geometry: Vec<LatLon>,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    Relation {
        id: i64,
        #[serde(default)]
        members: Vec<OsmMember>,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
}

/// Converts an Overpass JSON response into features in the map projection.
pub fn parse_overpass(response: Value) -> Result<FeatureCollection> {
    let response: OverpassResponse = serde_json::from_value(response)
        .map_err(|e| MapError::Parse(format!("invalid Overpass response: {}", e)))?;

    let mut features = Vec::new();
    for element in response.elements {
        let (kind, id, geometry, tags) = match element {
            OsmElement::Node { id, lat, lon, tags } => {
                // Untagged nodes are way vertices
                if tags.is_empty() {
                    continue;
                }
                (
                    "node",
                    id,
                    Some(Geometry::Point(Point::new(lon, lat))),
                    tags,
                )
            }
            OsmElement::Way { id, geometry, tags } => ("way", id, way_geometry(&geometry, &tags), tags),
            OsmElement::Relation { id, members, tags } => {
                let geometry = match tags.get("type").map(String::as_str) {
                    Some("multipolygon") | Some("boundary") => relation_geometry(&members),
                    _ => None,
                };
                ("relation", id, geometry, tags)
            }
        };
        let Some(geometry) = geometry else {
            log::debug!("skipping {}/{} without usable geometry", kind, id);
            continue;
        };

        let mut attributes: Attributes = tags
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        attributes.insert("osm_id".into(), Value::from(id));
        attributes.insert("osm_type".into(), Value::String(kind.into()));
        features.push(Feature::new(format!("{}/{}", kind, id), geometry, attributes));
    }

    Ok(FeatureCollection::new(features).project_from_lon_lat())
}

fn coords(points: &[LatLon]) -> Vec<Coord<f64>> {
    points.iter().map(|p| Coord { x: p.lon, y: p.lat }).collect()
}

fn is_area(tags: &BTreeMap<String, String>) -> bool {
    match tags.get("area").map(String::as_str) {
        Some("yes") => true,
        Some("no") => false,
        _ => {
            AREA_KEYS.iter().any(|k| tags.contains_key(*k))
                || tags.get("waterway").map_or(false, |w| w == "riverbank")
        }
    }
}

fn way_geometry(points: &[LatLon], tags: &BTreeMap<String, String>) -> Option<Geometry<f64>> {
    let line = LineString::new(coords(points));
    if line.0.len() < 2 {
        return None;
    }
    if line.is_closed() && line.0.len() >= 4 && is_area(tags) {
        Some(Geometry::Polygon(Polygon::new(line, vec![])))
    } else {
        Some(Geometry::LineString(line))
    }
}

/// Joins open way segments end to end into closed rings. Segments that never
/// close are dropped.
fn assemble_rings(mut segments: Vec<Vec<Coord<f64>>>) -> Vec<LineString<f64>> {
    let mut rings = Vec::new();
    while let Some(mut current) = segments.pop() {
        loop {
            if current.len() >= 4 && current.first() == current.last() {
                rings.push(LineString::new(current));
                break;
            }
            let Some(&tail) = current.last() else { break };
            let next = segments.iter().position(|s| {
                s.first() == Some(&tail) || s.last() == Some(&tail)
            });
            match next {
                Some(index) => {
                    let mut segment = segments.swap_remove(index);
                    if segment.first() != Some(&tail) {
                        segment.reverse();
                    }
                    current.extend(segment.into_iter().skip(1));
                }
                None => break,
            }
        }
    }
    rings
}

fn relation_geometry(members: &[OsmMember]) -> Option<Geometry<f64>> {
    let ways = |role: &str| {
        members
            .iter()
            .filter(|m| m.kind == "way" && m.role == role && m.geometry.len() >= 2)
            .map(|m| coords(&m.geometry))
            .collect::<Vec<_>>()
    };

    let mut polygons: Vec<Polygon<f64>> = assemble_rings(ways("outer"))
        .into_iter()
        .map(|ring| Polygon::new(ring, vec![]))
        .collect();
    if polygons.is_empty() {
        return None;
    }

    for inner in assemble_rings(ways("inner")) {
        let probe = Point::from(inner.0[0]);
        if let Some(owner) = polygons.iter_mut().find(|p| p.contains(&probe)) {
            owner.interiors_push(inner);
        }
    }

    Some(if polygons.len() == 1 {
        Geometry::Polygon(polygons.remove(0))
    } else {
        Geometry::MultiPolygon(MultiPolygon::new(polygons))
    })
}
