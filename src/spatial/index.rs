use crate::{core::bounds::Bounds, data::feature::FeatureId};

use geo::BoundingRect;
use geo_types::Geometry;
use rstar::{RTree, RTreeObject, AABB};

/// A spatial item that can be indexed via an R-tree
#[derive(Debug, Clone)]
pub struct SpatialItem<T> {
    pub id: FeatureId,
    pub bounds: Bounds,
    pub data: T,
}

impl<T> SpatialItem<T> {
    pub fn new(id: FeatureId, bounds: Bounds, data: T) -> Self {
        Self { id, bounds, data }
    }

    /// Indexes `data` by the bounding rectangle of `geometry`. Empty geometries
    /// have none and are not indexable.
    pub fn for_geometry(id: FeatureId, geometry: &Geometry<f64>, data: T) -> Option<Self> {
        let rect = geometry.bounding_rect()?;
        Some(Self::new(id, Bounds::from_rect(&rect), data))
    }
}

impl<T> PartialEq for SpatialItem<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for SpatialItem<T> {}

// --- rstar integration -------------------------------------------------------------------------

impl<T> RTreeObject for SpatialItem<T> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bounds.min.x, self.bounds.min.y],
            [self.bounds.max.x, self.bounds.max.y],
        )
    }
}

/// R-tree over feature envelopes. Queries return candidates; exact geometry
/// tests are the caller's job.
pub struct SpatialIndex<T> {
    rtree: RTree<SpatialItem<T>>,
}

impl<T> SpatialIndex<T> {
    /// Builds the tree in one pass, which packs better than repeated inserts.
    pub fn bulk_load(items: Vec<SpatialItem<T>>) -> Self {
        Self {
            rtree: RTree::bulk_load(items),
        }
    }

    pub fn query(&self, bounds: &Bounds) -> Vec<&SpatialItem<T>> {
        let envelope = AABB::from_corners(
            [bounds.min.x, bounds.min.y],
            [bounds.max.x, bounds.max.y],
        );
        self.rtree.locate_in_envelope_intersecting(&envelope).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{polygon, MultiPolygon, Point};

    fn square(id: &str, x: f64, y: f64, size: f64) -> SpatialItem<()> {
        let poly = polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
            (x: x, y: y),
        ];
        SpatialItem::for_geometry(FeatureId::from(id), &Geometry::Polygon(poly), ()).unwrap()
    }

    #[test]
    fn test_query_returns_intersecting_envelopes() {
        let index = SpatialIndex::bulk_load(vec![
            square("a", 0.0, 0.0, 10.0),
            square("b", 20.0, 20.0, 5.0),
        ]);
        let hits = index.query(&Bounds::from_coords(5.0, 5.0, 6.0, 6.0));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, FeatureId::from("a"));
        assert_eq!(index.query(&Bounds::from_coords(-1.0, -1.0, 30.0, 30.0)).len(), 2);
    }

    #[test]
    fn test_empty_geometries_are_not_indexed() {
        let empty = Geometry::MultiPolygon(MultiPolygon::<f64>::new(Vec::new()));
        assert!(SpatialItem::for_geometry(FeatureId::from("e"), &empty, ()).is_none());

        let point = SpatialItem::for_geometry(FeatureId::from("p"), &Geometry::Point(Point::new(3.0, 4.0)), 0)
            .unwrap();
        let index = SpatialIndex::bulk_load(vec![point]);
        assert_eq!(index.query(&Bounds::from_coords(2.0, 3.0, 4.0, 5.0))[0].data, 0);
        assert!(index.query(&Bounds::from_coords(5.0, 5.0, 6.0, 6.0)).is_empty());
    }
}
