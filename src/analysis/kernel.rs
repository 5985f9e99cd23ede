//! Planar geometry capability used by the statistics engine.

use geo::{Area, BooleanOps, Intersects};
use geo_types::{Geometry, MultiPolygon};

pub trait GeometryKernel: Send + Sync {
    fn area(&self, geometry: &MultiPolygon<f64>) -> f64;

    fn intersects(&self, a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> bool;

    fn intersection(&self, a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64>;
}

/// Kernel backed by the `geo` crate's boolean operations
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoKernel;

impl GeometryKernel for GeoKernel {
    fn area(&self, geometry: &MultiPolygon<f64>) -> f64 {
        geometry.unsigned_area()
    }

    fn intersects(&self, a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> bool {
        a.intersects(b)
    }

    fn intersection(&self, a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        a.intersection(b)
    }
}

/// Polygonal view of a geometry; `None` for points, lines and collections.
pub fn polygonal(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Some(mp.clone()),
        Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::Triangle(t) => Some(MultiPolygon::new(vec![t.to_polygon()])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{polygon, Point};

    #[test]
    fn test_overlap_area() {
        let a = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0), (x: 0.0, y: 0.0),
        ]]);
        let b = MultiPolygon::new(vec![polygon![
            (x: 2.0, y: 0.0), (x: 6.0, y: 0.0), (x: 6.0, y: 4.0), (x: 2.0, y: 4.0), (x: 2.0, y: 0.0),
        ]]);
        let kernel = GeoKernel;
        assert!(kernel.intersects(&a, &b));
        assert!((kernel.area(&kernel.intersection(&a, &b)) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_points_are_not_polygonal() {
        assert!(polygonal(&Geometry::Point(Point::new(0.0, 0.0))).is_none());
    }
}
