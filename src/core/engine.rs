//! The mapping engine collaborator.
//!
//! Drawing, hit-testing and view fitting belong to the engine; the registry
//! only tells it what exists and how it should look. [`HeadlessEngine`] is the
//! in-process implementation used by the viewer binary and the tests.

use crate::{
    classify::symbology::Symbology,
    core::{bounds::Bounds, geo, geo::Point, view::MapView},
    data::feature::{FeatureCollection, FeatureId},
    layers::base::{LayerId, LayerStyle},
    prelude::HashMap,
    spatial::index::{SpatialIndex, SpatialItem},
    tiles::source::TileSpec,
    MapError, Result,
};
use ::geo::Intersects;
use geo_types::{Coord, Geometry};

/// A feature found under the pointer or inside an extent
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hit {
    pub layer: LayerId,
    pub feature: FeatureId,
}

#[derive(Debug, Clone)]
pub enum RenderableContent {
    Features(FeatureCollection),
    Tiles(TileSpec),
}

/// How a renderable is drawn. `z_index` grows upwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    pub visible: bool,
    pub opacity: f64,
    pub z_index: usize,
    pub style: LayerStyle,
    pub symbology: Option<Symbology>,
}

#[derive(Debug, Clone)]
pub struct Renderable {
    pub id: LayerId,
    pub content: RenderableContent,
    pub state: RenderState,
}

pub trait MapEngine: Send {
    fn add_renderable(&mut self, renderable: Renderable) -> Result<()>;

    /// Returns whether something was removed
    fn remove_renderable(&mut self, id: &LayerId) -> bool;

    fn update_renderable(&mut self, id: &LayerId, state: RenderState) -> Result<()>;

    /// Swaps the features of a feature renderable, e.g. once a WFS load lands.
    fn replace_features(&mut self, id: &LayerId, features: FeatureCollection) -> Result<()>;

    /// Topmost feature of every visible feature layer under `pixel`, topmost
    /// layer first.
    fn hit_test(&self, pixel: Point) -> Result<Vec<Hit>>;

    /// Every feature of every visible feature layer intersecting `extent`
    /// (map units), topmost layer first.
    fn hit_test_extent(&self, extent: &Bounds) -> Result<Vec<Hit>>;

    fn fit_view(&mut self, extent: &Bounds);

    fn view(&self) -> MapView;

    fn set_view(&mut self, view: MapView);

    /// Viewport size in pixels
    fn viewport_size(&self) -> Point;

    fn pixel_to_map(&self, pixel: Point) -> Point {
        self.view().pixel_to_map(pixel, self.viewport_size())
    }

    fn project_to_4326(&self, coord: Coord<f64>) -> Coord<f64> {
        geo::project_to_4326(coord)
    }

    fn project_from_lon_lat(&self, coord: Coord<f64>) -> Coord<f64> {
        geo::project_from_lon_lat(coord)
    }
}

struct EngineLayer {
    content: RenderableContent,
    state: RenderState,
    /// Spatial index over feature positions; `None` for tile content
    index: Option<SpatialIndex<usize>>,
}

impl EngineLayer {
    fn new(content: RenderableContent, state: RenderState) -> Self {
        let index = match &content {
            RenderableContent::Features(features) => Some(build_index(features)),
            RenderableContent::Tiles(_) => None,
        };
        Self {
            content,
            state,
            index,
        }
    }

    /// Feature positions (in draw order) whose geometry intersects `extent`
    fn matches(&self, extent: &Bounds) -> Vec<usize> {
        let (Some(index), RenderableContent::Features(features)) = (&self.index, &self.content)
        else {
            return Vec::new();
        };
        let probe = Geometry::Polygon(extent.to_rect().to_polygon());
        let mut positions: Vec<usize> = index
            .query(extent)
            .into_iter()
            .map(|item| item.data)
            .filter(|&pos| features.features[pos].geometry.intersects(&probe))
            .collect();
        positions.sort_unstable();
        positions
    }
}

fn build_index(features: &FeatureCollection) -> SpatialIndex<usize> {
    let items = features
        .iter()
        .enumerate()
        .filter_map(|(pos, f)| SpatialItem::for_geometry(f.id.clone(), &f.geometry, pos))
        .collect();
    SpatialIndex::bulk_load(items)
}

/// Engine without a screen: keeps renderables, a view and an R-tree per
/// feature layer for hit-testing.
pub struct HeadlessEngine {
    layers: HashMap<LayerId, EngineLayer>,
    view: MapView,
    size: Point,
    hit_tolerance_px: f64,
}

impl HeadlessEngine {
    pub fn new(size: Point, hit_tolerance_px: f64) -> Self {
        Self {
            layers: HashMap::default(),
            view: MapView::default(),
            size,
            hit_tolerance_px,
        }
    }

    pub fn set_viewport_size(&mut self, size: Point) {
        self.size = size;
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn contains(&self, id: &LayerId) -> bool {
        self.layers.contains_key(id)
    }

    pub fn state(&self, id: &LayerId) -> Option<&RenderState> {
        self.layers.get(id).map(|l| &l.state)
    }

    /// Visible feature layers, topmost first
    fn hittable(&self) -> Vec<(&LayerId, &EngineLayer)> {
        let mut layers: Vec<_> = self
            .layers
            .iter()
            .filter(|(_, l)| l.state.visible && l.index.is_some())
            .collect();
        layers.sort_by(|a, b| b.1.state.z_index.cmp(&a.1.state.z_index));
        layers
    }

    fn feature_id(layer: &EngineLayer, pos: usize) -> Option<FeatureId> {
        match &layer.content {
            RenderableContent::Features(features) => features.features.get(pos).map(|f| f.id.clone()),
            RenderableContent::Tiles(_) => None,
        }
    }
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new(Point::new(1024.0, 768.0), 5.0)
    }
}

impl MapEngine for HeadlessEngine {
    fn add_renderable(&mut self, renderable: Renderable) -> Result<()> {
        if self.layers.contains_key(&renderable.id) {
            return Err(MapError::InvalidLayer(format!(
                "{} is already registered with the engine",
                renderable.id
            )));
        }
        log::debug!("engine: add {} at z {}", renderable.id, renderable.state.z_index);
        self.layers
            .insert(renderable.id, EngineLayer::new(renderable.content, renderable.state));
        Ok(())
    }

    fn remove_renderable(&mut self, id: &LayerId) -> bool {
        self.layers.remove(id).is_some()
    }

    fn update_renderable(&mut self, id: &LayerId, state: RenderState) -> Result<()> {
        let layer = self
            .layers
            .get_mut(id)
            .ok_or_else(|| MapError::LayerNotFound(id.clone()))?;
        layer.state = state;
        Ok(())
    }

    fn replace_features(&mut self, id: &LayerId, features: FeatureCollection) -> Result<()> {
        let layer = self
            .layers
            .get_mut(id)
            .ok_or_else(|| MapError::LayerNotFound(id.clone()))?;
        if matches!(layer.content, RenderableContent::Tiles(_)) {
            return Err(MapError::InvalidLayer(format!("{} is a tile layer", id)));
        }
        layer.index = Some(build_index(&features));
        layer.content = RenderableContent::Features(features);
        Ok(())
    }

    fn hit_test(&self, pixel: Point) -> Result<Vec<Hit>> {
        if self.size.x <= 0.0 || self.size.y <= 0.0 {
            return Err(MapError::SpatialIndexUnavailable(
                "viewport has no size yet".into(),
            ));
        }
        let center = self.pixel_to_map(pixel);
        let radius = self.hit_tolerance_px.max(0.5) * self.view.resolution();
        let probe = Bounds::around(center, radius);

        Ok(self
            .hittable()
            .into_iter()
            .filter_map(|(id, layer)| {
                // Later features draw over earlier ones
                let top = *layer.matches(&probe).last()?;
                Some(Hit {
                    layer: id.clone(),
                    feature: Self::feature_id(layer, top)?,
                })
            })
            .collect())
    }

    fn hit_test_extent(&self, extent: &Bounds) -> Result<Vec<Hit>> {
        if !extent.is_valid() {
            return Ok(Vec::new());
        }
        let mut hits = Vec::new();
        for (id, layer) in self.hittable() {
            for pos in layer.matches(extent) {
                if let Some(feature) = Self::feature_id(layer, pos) {
                    hits.push(Hit {
                        layer: id.clone(),
                        feature,
                    });
                }
            }
        }
        Ok(hits)
    }

    fn fit_view(&mut self, extent: &Bounds) {
        self.view = MapView::fit(extent, self.size);
    }

    fn view(&self) -> MapView {
        self.view
    }

    fn set_view(&mut self, view: MapView) {
        self.view = view;
    }

    fn viewport_size(&self) -> Point {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::feature::{Attributes, Feature};
    use geo_types::polygon;

    fn square(id: &str, x: f64, y: f64, size: f64) -> Feature {
        Feature::new(
            id,
            Geometry::Polygon(polygon![
                (x: x, y: y),
                (x: x + size, y: y),
                (x: x + size, y: y + size),
                (x: x, y: y + size),
                (x: x, y: y),
            ]),
            Attributes::new(),
        )
    }

    fn state(z_index: usize) -> RenderState {
        RenderState {
            visible: true,
            opacity: 1.0,
            z_index,
            style: LayerStyle::Standard,
            symbology: None,
        }
    }

    fn engine_with_two_layers() -> (HeadlessEngine, LayerId, LayerId) {
        let mut engine = HeadlessEngine::new(Point::new(800.0, 600.0), 3.0);
        engine.set_view(MapView::new(0.0, 0.0, 10.0));
        let lower = LayerId::new();
        let upper = LayerId::new();
        engine
            .add_renderable(Renderable {
                id: lower.clone(),
                content: RenderableContent::Features(FeatureCollection::new(vec![
                    square("a", -1000.0, -1000.0, 2000.0),
                    square("b", -500.0, -500.0, 1000.0),
                ])),
                state: state(1),
            })
            .unwrap();
        engine
            .add_renderable(Renderable {
                id: upper.clone(),
                content: RenderableContent::Features(FeatureCollection::new(vec![square(
                    "c", -100.0, -100.0, 200.0,
                )])),
                state: state(2),
            })
            .unwrap();
        (engine, lower, upper)
    }

    #[test]
    fn test_click_hits_topmost_feature_per_layer() {
        let (engine, lower, upper) = engine_with_two_layers();
        let hits = engine.hit_test(Point::new(400.0, 300.0)).unwrap();
        assert_eq!(
            hits,
            vec![
                Hit { layer: upper, feature: FeatureId::from("c") },
                Hit { layer: lower, feature: FeatureId::from("b") },
            ]
        );
    }

    #[test]
    fn test_hidden_layers_are_not_hit() {
        let (mut engine, lower, upper) = engine_with_two_layers();
        let mut hidden = state(2);
        hidden.visible = false;
        engine.update_renderable(&upper, hidden).unwrap();
        let hits = engine.hit_test(Point::new(400.0, 300.0)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].layer, lower);
    }

    #[test]
    fn test_extent_returns_every_intersecting_feature() {
        let (engine, _, _) = engine_with_two_layers();
        let hits = engine
            .hit_test_extent(&Bounds::from_coords(600.0, 600.0, 700.0, 700.0))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].feature, FeatureId::from("a"));
    }

    #[test]
    fn test_zero_sized_viewport_cannot_hit_test() {
        let (mut engine, _, _) = engine_with_two_layers();
        engine.set_viewport_size(Point::new(0.0, 0.0));
        assert!(matches!(
            engine.hit_test(Point::new(0.0, 0.0)),
            Err(MapError::SpatialIndexUnavailable(_))
        ));
    }

    #[test]
    fn test_replace_features_reindexes() {
        let (mut engine, lower, _) = engine_with_two_layers();
        engine
            .replace_features(&lower, FeatureCollection::new(vec![square("z", 5000.0, 5000.0, 10.0)]))
            .unwrap();
        let hits = engine
            .hit_test_extent(&Bounds::from_coords(5001.0, 5001.0, 5002.0, 5002.0))
            .unwrap();
        assert_eq!(hits, vec![Hit { layer: lower, feature: FeatureId::from("z") }]);
    }
}
