//! Upload ingestion: GeoJSON or KML text in, projected features out.

use crate::{
    data::{
        feature::{Attributes, Feature, FeatureCollection},
        geojson::{self, SourceCrs},
    },
    MapError, Result,
};
use geo_types::{Coord, Geometry, GeometryCollection, LineString, MultiPolygon, Point, Polygon};
use serde_json::Value;

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    GeoJson,
    Kml,
}

/// Upload parser
pub struct DataProcessor;

impl DataProcessor {
    /// Detects the format of input data
    pub fn detect_format(data: &str) -> Option<DataFormat> {
        let trimmed = data.trim_start_matches('\u{feff}').trim();
        if trimmed.starts_with('{') {
            return Some(DataFormat::GeoJson);
        }
        if trimmed.starts_with('<') && trimmed.contains("<kml") {
            return Some(DataFormat::Kml);
        }
        None
    }

    /// Parses an upload into features in the map projection.
    ///
    /// Unknown formats, malformed payloads and payloads that yield no features
    /// are all `MapError::Parse`; nothing is partially returned.
    pub fn parse(data: &str, id_prefix: &str) -> Result<FeatureCollection> {
        let format = Self::detect_format(data)
            .ok_or_else(|| MapError::Parse("unrecognized format, expected GeoJSON or KML".into()))?;

        let collection = match format {
            DataFormat::GeoJson => geojson::parse_features(data, id_prefix, SourceCrs::LonLat)?,
            DataFormat::Kml => parse_kml(data, id_prefix)?.project_from_lon_lat(),
        };

        if collection.is_empty() {
            return Err(MapError::Parse("the file contains no features".into()));
        }
        log::debug!("parsed {} {:?} features for {}", collection.len(), format, id_prefix);
        Ok(collection)
    }
}

/// A matched element: the raw attribute text of its opening tag and its inner text.
struct Element<'a> {
    attrs: &'a str,
    inner: &'a str,
}

impl<'a> Element<'a> {
    fn attr(&self, name: &str) -> Option<String> {
        let needle = format!("{}=", name);
        let start = self.attrs.find(&needle)? + needle.len();
        let rest = &self.attrs[start..];
        let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let end = rest[1..].find(quote)?;
        Some(decode_text(&rest[1..1 + end]))
    }
}

/// Non-overlapping `<tag ...>...</tag>` elements of `xml`, outermost first.
/// Self-closing elements have no content and are skipped.
fn elements<'a>(xml: &'a str, tag: &str) -> Vec<Element<'a>> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let mut found = Vec::new();
    let mut cursor = 0;

    while let Some(pos) = xml[cursor..].find(&open) {
        let start = cursor + pos;
        let after_name = start + open.len();
        // Reject prefixes such as `<LineStringX` when looking for `<LineString`.
        match xml[after_name..].chars().next() {
            Some(c) if c == '>' || c == '/' || c.is_whitespace() => {}
            _ => {
                cursor = after_name;
                continue;
            }
        }
        let Some(tag_end) = xml[after_name..].find('>').map(|p| after_name + p) else {
            break;
        };
        if xml[..tag_end].ends_with('/') {
            cursor = tag_end + 1;
            continue;
        }
        let Some(close_pos) = xml[tag_end..].find(&close).map(|p| tag_end + p) else {
            break;
        };
        found.push(Element {
            attrs: &xml[after_name..tag_end],
            inner: &xml[tag_end + 1..close_pos],
        });
        cursor = close_pos + close.len();
    }
    found
}

fn first_text(xml: &str, tag: &str) -> Option<String> {
    elements(xml, tag)
        .first()
        .map(|e| decode_text(e.inner))
        .filter(|text| !text.is_empty())
}

fn decode_text(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(cdata) = trimmed
        .strip_prefix("<![CDATA[")
        .and_then(|rest| rest.strip_suffix("]]>"))
    {
        return cdata.to_string();
    }
    trimmed
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn parse_coordinates(text: &str) -> Result<Vec<Coord<f64>>> {
    text.split_whitespace()
        .map(|tuple| {
            let mut parts = tuple.split(',').map(|p| p.trim().parse::<f64>());
            match (parts.next(), parts.next()) {
                (Some(Ok(x)), Some(Ok(y))) if x.is_finite() && y.is_finite() => Ok(Coord { x, y }),
                _ => Err(MapError::Parse(format!("invalid KML coordinate \"{}\"", tuple))),
            }
        })
        .collect()
}

fn ring(xml: &str) -> Result<LineString<f64>> {
    let text = first_text(xml, "coordinates")
        .ok_or_else(|| MapError::Parse("KML ring without coordinates".into()))?;
    let coords = parse_coordinates(&text)?;
    if coords.len() < 3 {
        return Err(MapError::Parse("KML ring needs at least three positions".into()));
    }
    let mut ring = LineString::new(coords);
    ring.close();
    Ok(ring)
}

fn kml_polygon(xml: &str) -> Result<Polygon<f64>> {
    let outer = elements(xml, "outerBoundaryIs")
        .first()
        .map(|e| ring(e.inner))
        .transpose()?
        .ok_or_else(|| MapError::Parse("KML Polygon without outerBoundaryIs".into()))?;
    let inner = elements(xml, "innerBoundaryIs")
        .iter()
        .map(|e| ring(e.inner))
        .collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(outer, inner))
}

fn placemark_geometry(xml: &str) -> Result<Option<Geometry<f64>>> {
    let mut parts: Vec<Geometry<f64>> = Vec::new();

    for point in elements(xml, "Point") {
        let text = first_text(point.inner, "coordinates")
            .ok_or_else(|| MapError::Parse("KML Point without coordinates".into()))?;
        let coord = parse_coordinates(&text)?
            .into_iter()
            .next()
            .ok_or_else(|| MapError::Parse("empty KML Point".into()))?;
        parts.push(Geometry::Point(Point::from(coord)));
    }
    for line in elements(xml, "LineString") {
        let text = first_text(line.inner, "coordinates")
            .ok_or_else(|| MapError::Parse("KML LineString without coordinates".into()))?;
        let coords = parse_coordinates(&text)?;
        if coords.len() < 2 {
            return Err(MapError::Parse("KML LineString needs two positions".into()));
        }
        parts.push(Geometry::LineString(LineString::new(coords)));
    }
    for polygon in elements(xml, "Polygon") {
        parts.push(Geometry::Polygon(kml_polygon(polygon.inner)?));
    }

    Ok(match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ if parts.iter().all(|g| matches!(g, Geometry::Polygon(_))) => {
            let polygons = parts
                .into_iter()
                .filter_map(|g| match g {
                    Geometry::Polygon(p) => Some(p),
                    _ => None,
                })
                .collect::<Vec<_>>();
            Some(Geometry::MultiPolygon(MultiPolygon::new(polygons)))
        }
        _ => Some(Geometry::GeometryCollection(GeometryCollection::from(parts))),
    })
}

fn placemark_attributes(xml: &str) -> Attributes {
    let mut attributes = Attributes::new();
    if let Some(name) = first_text(xml, "name") {
        attributes.insert("name".into(), Value::String(name));
    }
    if let Some(description) = first_text(xml, "description") {
        attributes.insert("description".into(), Value::String(description));
    }
    for data in elements(xml, "Data") {
        if let Some(key) = data.attr("name") {
            let value = first_text(data.inner, "value").map_or(Value::Null, Value::String);
            attributes.insert(key, value);
        }
    }
    for data in elements(xml, "SimpleData") {
        if let Some(key) = data.attr("name") {
            attributes.insert(key, Value::String(decode_text(data.inner)));
        }
    }
    attributes
}

/// Placemarks to lon/lat features. Placemarks without geometry are skipped.
fn parse_kml(data: &str, id_prefix: &str) -> Result<FeatureCollection> {
    let mut features = Vec::new();
    for (index, placemark) in elements(data, "Placemark").into_iter().enumerate() {
        let Some(geometry) = placemark_geometry(placemark.inner)? else {
            log::debug!("skipping placemark {} of {} without geometry", index, id_prefix);
            continue;
        };
        let id = placemark
            .attr("id")
            .unwrap_or_else(|| format!("{}#{}", id_prefix, index));
        features.push(Feature::new(id, geometry, placemark_attributes(placemark.inner)));
    }
    Ok(FeatureCollection::new(features))
}
