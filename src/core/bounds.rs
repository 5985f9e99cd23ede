use crate::core::geo::Point;
use geo_types::{coord, Rect};
use serde::{Deserialize, Serialize};

/// Axis-aligned extent in screen pixels or projected map units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    /// Creates new bounds from two points
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// Creates bounds from individual coordinates
    pub fn from_coords(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new(Point::new(min_x, min_y), Point::new(max_x, max_y))
    }

    /// Normalized bounds spanning two arbitrary corners (e.g. a drag gesture
    /// that went up and to the left).
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self::from_coords(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y))
    }

    /// Square bounds of half-size `radius` around `center`
    pub fn around(center: Point, radius: f64) -> Self {
        Self::from_coords(
            center.x - radius,
            center.y - radius,
            center.x + radius,
            center.y + radius,
        )
    }

    /// Gets the width of the bounds
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Gets the height of the bounds
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Gets the center point of the bounds
    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    /// Grows to cover `other` as well
    pub fn extend_bounds(&mut self, other: &Bounds) {
        self.min = Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y));
        self.max = Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y));
    }

    /// Checks if the bounds are valid (min <= max)
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.min.x, y: self.min.y },
            coord! { x: self.max.x, y: self.max.y },
        )
    }

    pub fn from_rect(rect: &Rect<f64>) -> Self {
        Self::new(rect.min().into(), rect.max().into())
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new(Point::new(0.0, 0.0), Point::new(0.0, 0.0))
    }
}
