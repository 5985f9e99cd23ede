use crate::core::{
    bounds::Bounds,
    constants::TILE_SIZE,
    geo::{LatLng, Point, MERCATOR_HALF_WORLD},
};
use serde::{Deserialize, Serialize};

/// Center and zoom of the map, in the portable form stored in shared documents.
///
/// `center` is `[lon, lat]` in EPSG:4326; `zoom` follows the usual slippy-map
/// convention (zoom 0 shows the whole world in one 256 px tile).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub center: [f64; 2],
    pub zoom: f64,
}

impl MapView {
    pub const MIN_ZOOM: f64 = 0.0;
    pub const MAX_ZOOM: f64 = 22.0;

    pub fn new(lon: f64, lat: f64, zoom: f64) -> Self {
        Self {
            center: [lon, lat],
            zoom: zoom.clamp(Self::MIN_ZOOM, Self::MAX_ZOOM),
        }
    }

    pub fn center_lat_lng(&self) -> LatLng {
        LatLng::new(self.center[1], self.center[0])
    }

    /// Center in map units (EPSG:3857)
    pub fn center_projected(&self) -> Point {
        self.center_lat_lng().to_mercator()
    }

    /// Map units per screen pixel at the current zoom
    pub fn resolution(&self) -> f64 {
        2.0 * MERCATOR_HALF_WORLD / (TILE_SIZE as f64 * 2_f64.powf(self.zoom))
    }

    /// Converts a pixel (origin top-left, y down) of a viewport of `size`
    /// into map coordinates.
    pub fn pixel_to_map(&self, pixel: Point, size: Point) -> Point {
        let center = self.center_projected();
        let res = self.resolution();
        Point::new(
            center.x + (pixel.x - size.x / 2.0) * res,
            center.y - (pixel.y - size.y / 2.0) * res,
        )
    }

    pub fn map_to_pixel(&self, coord: Point, size: Point) -> Point {
        let center = self.center_projected();
        let res = self.resolution();
        Point::new(
            (coord.x - center.x) / res + size.x / 2.0,
            (center.y - coord.y) / res + size.y / 2.0,
        )
    }

    /// View that shows `extent` (map units) inside a viewport of `size` pixels.
    pub fn fit(extent: &Bounds, size: Point) -> Self {
        let center = LatLng::from_mercator(extent.center());
        let width = extent.width().max(f64::EPSILON);
        let height = extent.height().max(f64::EPSILON);
        let res = (width / size.x.max(1.0)).max(height / size.y.max(1.0));
        let zoom = (2.0 * MERCATOR_HALF_WORLD / (TILE_SIZE as f64 * res)).log2();
        Self::new(center.lng, center.lat, zoom.floor())
    }

    /// Component-wise comparison within `tolerance`
    pub fn approx_eq(&self, other: &MapView, tolerance: f64) -> bool {
        (self.center[0] - other.center[0]).abs() <= tolerance
            && (self.center[1] - other.center[1]).abs() <= tolerance
            && (self.zoom - other.zoom).abs() <= tolerance
    }
}

impl Default for MapView {
    fn default() -> Self {
        Self::new(0.0, 0.0, 2.0)
    }
}
