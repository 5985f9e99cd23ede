//! Geographic primitives and the EPSG:4326 ↔ EPSG:3857 adapter.
//!
//! Every geometry the engine works with lives in Web Mercator meters. Data
//! arriving in lon/lat (uploads, Overpass, shared document views) goes through
//! [`project_geometry_from_lon_lat`] once at ingestion.

use geo::MapCoords;
use geo_types::{Coord, Geometry};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Web Mercator projection constants
pub const EARTH_RADIUS: f64 = 6378137.0;
pub const MAX_LATITUDE: f64 = 85.0511287798;

/// Half the width of the projected world in meters.
pub const MERCATOR_HALF_WORLD: f64 = PI * EARTH_RADIUS;

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Clamps latitude to the range Web Mercator can represent
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }

    /// Converts to Web Mercator projection (EPSG:3857)
    pub fn to_mercator(&self) -> Point {
        let lat = Self::clamp_lat(self.lat);
        let x = self.lng.to_radians() * EARTH_RADIUS;
        let y = ((PI / 4.0 + lat.to_radians() / 2.0).tan().ln()) * EARTH_RADIUS;
        Point::new(x, y)
    }

    /// Creates LatLng from Web Mercator coordinates
    pub fn from_mercator(point: Point) -> Self {
        let lng = (point.x / EARTH_RADIUS).to_degrees();
        let lat = (2.0 * (point.y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
        Self::new(lat, lng)
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// A point in screen pixels or projected map units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl From<Point> for Coord<f64> {
    fn from(point: Point) -> Self {
        Coord {
            x: point.x,
            y: point.y,
        }
    }
}

impl From<Coord<f64>> for Point {
    fn from(coord: Coord<f64>) -> Self {
        Point::new(coord.x, coord.y)
    }
}

/// Represents a tile coordinate in the slippy map tile system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Projected extent of the tile as `[min_x, min_y, max_x, max_y]` in EPSG:3857
    pub fn mercator_bbox(&self) -> [f64; 4] {
        let n = 2_f64.powi(self.z as i32);
        let size = 2.0 * MERCATOR_HALF_WORLD / n;
        let min_x = -MERCATOR_HALF_WORLD + self.x as f64 * size;
        let max_y = MERCATOR_HALF_WORLD - self.y as f64 * size;
        [min_x, max_y - size, min_x + size, max_y]
    }

    /// Checks if the tile is valid for the given zoom level
    pub fn is_valid(&self) -> bool {
        let max_coord = 2_u32.pow(self.z as u32);
        self.x < max_coord && self.y < max_coord
    }
}

/// Projects a lon/lat coordinate into the map's working projection.
pub fn project_from_lon_lat(coord: Coord<f64>) -> Coord<f64> {
    LatLng::new(coord.y, coord.x).to_mercator().into()
}

/// Projects a map coordinate back to lon/lat (EPSG:4326).
pub fn project_to_4326(coord: Coord<f64>) -> Coord<f64> {
    let lat_lng = LatLng::from_mercator(coord.into());
    Coord {
        x: lat_lng.lng,
        y: lat_lng.lat,
    }
}

pub fn project_geometry_from_lon_lat(geometry: &Geometry<f64>) -> Geometry<f64> {
    geometry.map_coords(project_from_lon_lat)
}

pub fn project_geometry_to_4326(geometry: &Geometry<f64>) -> Geometry<f64> {
    geometry.map_coords(project_to_4326)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mercator_round_trip() {
        let original = LatLng::new(-36.5, -60.0);
        let back = LatLng::from_mercator(original.to_mercator());
        assert!((back.lat - original.lat).abs() < 1e-9);
        assert!((back.lng - original.lng).abs() < 1e-9);
    }

    #[test]
    fn test_origin_projects_to_zero() {
        let p = LatLng::new(0.0, 0.0).to_mercator();
        assert!(p.x.abs() < 1e-9 && p.y.abs() < 1e-9);
    }

    #[test]
    fn test_geometry_projection_round_trip() {
        let point = Geometry::Point(geo_types::Point::new(-58.4, -34.6));
        let projected = project_geometry_from_lon_lat(&point);
        let back = project_geometry_to_4326(&projected);
        match back {
            Geometry::Point(p) => {
                assert!((p.x() + 58.4).abs() < 1e-9);
                assert!((p.y() + 34.6).abs() < 1e-9);
            }
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_tile_bbox_covers_world_at_zoom_zero() {
        let bbox = TileCoord::new(0, 0, 0).mercator_bbox();
        assert!((bbox[0] + MERCATOR_HALF_WORLD).abs() < 1e-6);
        assert!((bbox[3] - MERCATOR_HALF_WORLD).abs() < 1e-6);
    }
}
