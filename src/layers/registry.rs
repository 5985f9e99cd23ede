//! Layer Registry
//!
//! Single owner of the active layers, their z-order and the pairing between
//! an interactive layer and its render-only visual partner. Every mutation
//! goes through here and is mirrored to the [`MapEngine`]; callers never touch
//! a partner directly, which is what keeps a pair in sync.
//!
//! Z-order is an explicit bottom-to-top list above the base layer (z 0).
//! Drawing layers are pinned to the top of it.

use crate::{
    classify::symbology::{build_symbology, Symbology, SymbologyRequest},
    core::{
        config::{ClassificationConfig, RemoteConfig},
        engine::{MapEngine, Renderable, RenderableContent},
    },
    data::feature::{Feature, FeatureCollection},
    layers::base::{Layer, LayerId, LayerKind, LoadState},
    prelude::HashMap,
    MapError, Result,
};

/// Proof that a load was started for a specific incarnation of a layer.
/// Results presented with an outdated ticket are discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub layer: LayerId,
    pub generation: u64,
}

pub struct LayerRegistry {
    layers: HashMap<LayerId, Layer>,
    /// Bottom to top
    order: Vec<LayerId>,
    engine: Box<dyn MapEngine>,
    classification: ClassificationConfig,
    proxy_url: Option<String>,
}

impl LayerRegistry {
    pub fn new(engine: Box<dyn MapEngine>) -> Self {
        Self {
            layers: HashMap::default(),
            order: Vec::new(),
            engine,
            classification: ClassificationConfig::default(),
            proxy_url: None,
        }
    }

    pub fn with_config(mut self, classification: ClassificationConfig, remote: &RemoteConfig) -> Self {
        self.classification = classification;
        self.proxy_url = remote.proxy_url.clone();
        self
    }

    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref()
    }

    pub fn engine(&self) -> &dyn MapEngine {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> &mut dyn MapEngine {
        self.engine.as_mut()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, id: &LayerId) -> Option<&Layer> {
        self.layers.get(id)
    }

    pub fn layer(&self, id: &LayerId) -> Result<&Layer> {
        self.layers
            .get(id)
            .ok_or_else(|| MapError::LayerNotFound(id.clone()))
    }

    /// Layers bottom to top
    pub fn ordered(&self) -> Vec<&Layer> {
        self.order.iter().filter_map(|id| self.layers.get(id)).collect()
    }

    /// Z-index of a layer; the base layer sits at 0
    pub fn z_index(&self, id: &LayerId) -> Option<usize> {
        self.order.iter().position(|l| l == id).map(|p| p + 1)
    }

    /// Layers whose features take part in selection and statistics
    pub fn selectable_layers(&self) -> Vec<&Layer> {
        self.ordered().into_iter().filter(|l| l.is_selectable()).collect()
    }

    /// The interactive layer that owns `partner`, if `partner` is a visual partner
    pub fn owner_of(&self, partner: &LayerId) -> Option<&LayerId> {
        self.layers
            .values()
            .find(|l| l.visual_partner() == Some(partner))
            .map(|l| l.id())
    }

    /// Redirects a partner id to its owner; other ids pass through.
    fn resolve(&self, id: &LayerId) -> Result<LayerId> {
        if !self.layers.contains_key(id) {
            return Err(MapError::LayerNotFound(id.clone()));
        }
        Ok(self.owner_of(id).cloned().unwrap_or_else(|| id.clone()))
    }

    /// First position of the pinned drawing layers (or the top)
    fn below_drawings(&self) -> usize {
        self.order
            .iter()
            .position(|id| self.layers.get(id).map_or(false, |l| l.kind() == LayerKind::Drawing))
            .unwrap_or(self.order.len())
    }

    /// Adds a layer and registers it with the engine.
    ///
    /// New layers go directly above the base layer; `bring_to_front` puts them
    /// just below the drawing layers instead. Drawing layers always go on top.
    pub fn add_layer(&mut self, layer: Layer, bring_to_front: bool) -> Result<LayerId> {
        let position = if layer.kind() == LayerKind::Drawing {
            self.order.len()
        } else if bring_to_front {
            self.below_drawings()
        } else {
            0
        };
        self.insert_at(layer, position)
    }

    /// Inserts directly below `anchor`, or just below the drawing layers when
    /// there is no anchor. Used to place layers that finish loading out of order.
    pub fn insert_below(&mut self, layer: Layer, anchor: Option<&LayerId>) -> Result<LayerId> {
        let position = self.anchor_position(anchor)?;
        self.insert_at(layer, position)
    }

    fn anchor_position(&self, anchor: Option<&LayerId>) -> Result<usize> {
        match anchor {
            Some(anchor) => self
                .order
                .iter()
                .position(|id| id == anchor)
                .ok_or_else(|| MapError::LayerNotFound(anchor.clone())),
            None => Ok(self.below_drawings()),
        }
    }

    fn insert_at(&mut self, layer: Layer, position: usize) -> Result<LayerId> {
        let content = match (layer.features(), layer.tiles()) {
            (Some(features), _) => RenderableContent::Features(features.clone()),
            (None, Some(tiles)) => RenderableContent::Tiles(tiles.clone()),
            (None, None) => {
                return Err(MapError::InvalidLayer(format!(
                    "layer \"{}\" has neither features nor tiles",
                    layer.name()
                )))
            }
        };
        let id = layer.id().clone();
        let position = position.min(self.order.len());

        self.engine.add_renderable(Renderable {
            id: id.clone(),
            content,
            state: layer.render_state(position + 1),
        })?;
        log::debug!("added {} layer {} \"{}\" at z {}", layer.kind(), id, layer.name(), position + 1);

        self.order.insert(position, id.clone());
        self.layers.insert(id.clone(), layer);
        self.sync_engine_from(position + 1)?;
        Ok(id)
    }

    /// Pushes render state for every layer at or above `start` in the order.
    fn sync_engine_from(&mut self, start: usize) -> Result<()> {
        for (pos, id) in self.order.iter().enumerate().skip(start) {
            if let Some(layer) = self.layers.get(id) {
                self.engine.update_renderable(id, layer.render_state(pos + 1))?;
            }
        }
        Ok(())
    }

    fn sync_engine(&mut self, id: &LayerId) -> Result<()> {
        let z = self
            .z_index(id)
            .ok_or_else(|| MapError::LayerNotFound(id.clone()))?;
        let layer = self.layer(id)?;
        let state = layer.render_state(z);
        self.engine.update_renderable(id, state)
    }

    /// Registers the visual (WMS) half of a hybrid layer, then its interactive
    /// (WFS) half right above it, still empty and pending. The visual partner
    /// is in the engine before the interactive layer can be selected.
    pub fn begin_hybrid_layer(
        &mut self,
        remote_layer_name: &str,
        title: &str,
        server_url: &str,
        style_name: Option<&str>,
    ) -> Result<LoadTicket> {
        let (visual, mut interactive) =
            Layer::hybrid_pair(title, server_url, remote_layer_name, style_name, self.proxy_url.clone())?;
        let generation = interactive.bump_generation();
        let id = self.insert_pair_at(visual, interactive, 0)?;
        Ok(LoadTicket { layer: id, generation })
    }

    /// Inserts an already linked pair directly below `anchor` (or just below
    /// the drawing layers). Returns the interactive layer id.
    pub fn insert_pair_below(
        &mut self,
        visual: Layer,
        interactive: Layer,
        anchor: Option<&LayerId>,
    ) -> Result<LayerId> {
        let position = self.anchor_position(anchor)?;
        self.insert_pair_at(visual, interactive, position)
    }

    fn insert_pair_at(&mut self, visual: Layer, interactive: Layer, position: usize) -> Result<LayerId> {
        if interactive.visual_partner() != Some(visual.id()) {
            return Err(MapError::InvalidLayer(format!(
                "{} is not the visual partner of {}",
                visual.id(),
                interactive.id()
            )));
        }
        let title = interactive.name().to_string();
        let visual_id = self.insert_at(visual, position)?;
        let position = self.z_index(&visual_id).unwrap_or(position + 1);
        match self.insert_at(interactive, position) {
            Ok(id) => {
                log::info!("hybrid layer {} \"{}\" paired with {}", id, title, visual_id);
                self.sync_partner(&id, Some(&visual_id))?;
                Ok(id)
            }
            Err(e) => {
                self.detach(&visual_id);
                self.sync_engine_from(0)?;
                Err(e)
            }
        }
    }

    /// Applies the outcome of a load started with `ticket`.
    ///
    /// A removed layer or a newer load makes the ticket stale and the result is
    /// dropped. A failed load keeps both layers: the visual partner still
    /// shows the data, the interactive layer stays empty and is marked failed.
    pub fn complete_load(&mut self, ticket: &LoadTicket, result: Result<FeatureCollection>) -> Result<()> {
        let current = self.layers.get(&ticket.layer).map(Layer::generation);
        if current != Some(ticket.generation) {
            let reason = match current {
                None => format!("{} was removed while loading", ticket.layer),
                Some(_) => format!("{} was reloaded while loading", ticket.layer),
            };
            log::debug!("discarding load result: {}", reason);
            return Err(MapError::StaleOperation(reason));
        }

        match result {
            Ok(features) => {
                self.engine.replace_features(&ticket.layer, features.clone())?;
                if let Some(layer) = self.layers.get_mut(&ticket.layer) {
                    log::info!("{} loaded {} features", ticket.layer, features.len());
                    layer.set_features(features);
                    layer.set_load_state(LoadState::Ready);
                }
                Ok(())
            }
            Err(e) => {
                log::warn!("{} failed to load, keeping visual partner only: {}", ticket.layer, e);
                if let Some(layer) = self.layers.get_mut(&ticket.layer) {
                    layer.set_load_state(LoadState::Failed(e.to_string()));
                }
                Err(e)
            }
        }
    }

    /// Starts a reload of a WFS layer, invalidating earlier tickets.
    pub fn begin_reload(&mut self, id: &LayerId) -> Result<LoadTicket> {
        let layer = self
            .layers
            .get_mut(id)
            .ok_or_else(|| MapError::LayerNotFound(id.clone()))?;
        if layer.kind() != LayerKind::Wfs {
            return Err(MapError::InvalidLayer(format!("{} is not a WFS layer", id)));
        }
        layer.set_load_state(LoadState::Pending);
        Ok(LoadTicket {
            layer: id.clone(),
            generation: layer.bump_generation(),
        })
    }

    fn detach(&mut self, id: &LayerId) -> Option<Layer> {
        self.engine.remove_renderable(id);
        self.order.retain(|l| l != id);
        self.layers.remove(id)
    }

    /// Removes a layer together with its visual partner. Removing a partner
    /// removes the layer that owns it. Returns every removed id.
    pub fn remove_layer(&mut self, id: &LayerId) -> Result<Vec<LayerId>> {
        let owner = self.resolve(id)?;
        let mut removed = Vec::new();
        if let Some(layer) = self.detach(&owner) {
            removed.push(owner.clone());
            if let Some(partner) = layer.visual_partner() {
                if self.detach(partner).is_some() {
                    removed.push(partner.clone());
                }
            }
        }
        self.sync_engine_from(0)?;
        log::debug!("removed layers {:?}", removed);
        Ok(removed)
    }

    /// Sets visibility on a layer and its partner. The partner is only shown
    /// while the owner is visible and has no data-driven style.
    pub fn set_visibility(&mut self, id: &LayerId, visible: bool) -> Result<()> {
        let owner = self.resolve(id)?;
        let partner = {
            let layer = self.layers.get_mut(&owner).ok_or_else(|| MapError::LayerNotFound(owner.clone()))?;
            layer.set_visible(visible);
            layer.visual_partner().cloned()
        };
        self.sync_partner(&owner, partner.as_ref())
    }

    pub fn set_opacity(&mut self, id: &LayerId, opacity: f64) -> Result<()> {
        let owner = self.resolve(id)?;
        let partner = {
            let layer = self.layers.get_mut(&owner).ok_or_else(|| MapError::LayerNotFound(owner.clone()))?;
            layer.set_opacity(opacity);
            layer.visual_partner().cloned()
        };
        self.sync_partner(&owner, partner.as_ref())
    }

    /// Copies visibility and opacity from `owner` onto its partner and pushes
    /// both to the engine.
    fn sync_partner(&mut self, owner: &LayerId, partner: Option<&LayerId>) -> Result<()> {
        if let Some(partner) = partner {
            let (visible, opacity) = {
                let layer = self.layer(owner)?;
                (layer.is_visible() && layer.symbology().is_none(), layer.opacity())
            };
            if let Some(p) = self.layers.get_mut(partner) {
                p.set_visible(visible);
                p.set_opacity(opacity);
            }
            self.sync_engine(partner)?;
        }
        self.sync_engine(owner)
    }

    /// Computes and applies a data-driven style, or clears it with `None`.
    /// Nothing changes when the computation fails.
    pub fn set_symbology(&mut self, id: &LayerId, request: Option<&SymbologyRequest>) -> Result<()> {
        let owner = self.resolve(id)?;
        let symbology = match request {
            Some(request) => {
                let layer = self.layer(&owner)?;
                let features = layer.features().ok_or_else(|| {
                    MapError::InvalidLayer(format!(
                        "\"{}\" is a tile layer and has no attributes to style",
                        layer.name()
                    ))
                })?;
                Some(build_symbology(features, request, &self.classification)?)
            }
            None => None,
        };
        self.apply_symbology(&owner, symbology)
    }

    /// Stores an already computed symbology, re-deriving its colors.
    pub fn restore_symbology(&mut self, id: &LayerId, symbology: Symbology) -> Result<()> {
        let owner = self.resolve(id)?;
        if !self.layer(&owner)?.has_features() {
            return Err(MapError::InvalidLayer(format!("{} has no features to style", owner)));
        }
        self.apply_symbology(&owner, Some(symbology.restore()))
    }

    fn apply_symbology(&mut self, owner: &LayerId, symbology: Option<Symbology>) -> Result<()> {
        let partner = {
            let layer = self.layers.get_mut(owner).ok_or_else(|| MapError::LayerNotFound(owner.clone()))?;
            layer.set_symbology(symbology);
            layer.visual_partner().cloned()
        };
        self.sync_partner(owner, partner.as_ref())
    }

    /// Appends features to a feature layer (e.g. a new sketch on the drawing layer).
    pub fn append_features(&mut self, id: &LayerId, features: Vec<Feature>) -> Result<()> {
        let layer = self
            .layers
            .get_mut(id)
            .ok_or_else(|| MapError::LayerNotFound(id.clone()))?;
        let collection = layer
            .features_mut()
            .ok_or_else(|| MapError::InvalidLayer(format!("{} has no features", id)))?;
        collection.features.extend(features);
        let updated = collection.clone();
        self.engine.replace_features(id, updated)
    }

    /// The drawing layer, if one exists
    pub fn drawing_layer(&self) -> Option<&Layer> {
        self.ordered().into_iter().find(|l| l.kind() == LayerKind::Drawing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classify::{breaks::ClassificationMethod, color::ColorRamp},
        core::{engine::HeadlessEngine, geo::Point},
        data::feature::Attributes,
    };
    use geo_types::Geometry;
    use serde_json::json;

    fn registry() -> LayerRegistry {
        LayerRegistry::new(Box::new(HeadlessEngine::new(Point::new(800.0, 600.0), 3.0)))
    }

    fn points(values: &[i64]) -> FeatureCollection {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut attrs = Attributes::new();
                attrs.insert("pop".into(), json!(v));
                Feature::new(format!("p{}", i), Geometry::Point(geo_types::Point::new(i as f64, 0.0)), attrs)
            })
            .collect()
    }

    fn names(registry: &LayerRegistry) -> Vec<String> {
        registry.ordered().iter().map(|l| l.name().to_string()).collect()
    }

    #[test]
    fn test_default_placement_and_bring_to_front() {
        let mut registry = registry();
        registry.add_layer(Layer::drawing(FeatureCollection::default()), false).unwrap();
        registry.add_layer(Layer::vector("a", LayerKind::Vector, points(&[1])), false).unwrap();
        registry.add_layer(Layer::vector("b", LayerKind::Vector, points(&[1])), false).unwrap();
        registry.add_layer(Layer::vector("front", LayerKind::Vector, points(&[1])), true).unwrap();
        assert_eq!(names(&registry), vec!["b", "a", "front", "Drawings"]);
    }

    #[test]
    fn test_hybrid_pair_is_adjacent_and_removed_together() {
        let mut registry = registry();
        let ticket = registry
            .begin_hybrid_layer("deas:partidos", "Partidos", "https://example.org/geoserver/wms", None)
            .unwrap();
        let partner = registry.layer(&ticket.layer).unwrap().visual_partner().cloned().unwrap();
        assert_eq!(registry.z_index(&partner), Some(1));
        assert_eq!(registry.z_index(&ticket.layer), Some(2));
        assert_eq!(registry.owner_of(&partner), Some(&ticket.layer));

        let removed = registry.remove_layer(&partner).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_partner_follows_visibility_and_opacity() {
        let mut registry = registry();
        let ticket = registry
            .begin_hybrid_layer("deas:partidos", "Partidos", "https://example.org/geoserver/wms", None)
            .unwrap();
        let partner = registry.layer(&ticket.layer).unwrap().visual_partner().cloned().unwrap();

        for (visible, opacity) in [(false, 0.3), (true, 0.8), (true, 0.1), (false, 1.0)] {
            registry.set_visibility(&ticket.layer, visible).unwrap();
            registry.set_opacity(&partner, opacity).unwrap();
            let owner = registry.layer(&ticket.layer).unwrap();
            let p = registry.layer(&partner).unwrap();
            assert_eq!(p.is_visible(), owner.is_visible());
            assert_eq!(p.opacity(), owner.opacity());
            assert_eq!(owner.opacity(), opacity);
        }
    }

    #[test]
    fn test_stale_ticket_is_rejected() {
        let mut registry = registry();
        let ticket = registry
            .begin_hybrid_layer("a:b", "AB", "https://example.org/geoserver/wms", None)
            .unwrap();
        let newer = registry.begin_reload(&ticket.layer).unwrap();
        assert!(matches!(
            registry.complete_load(&ticket, Ok(points(&[1]))),
            Err(MapError::StaleOperation(_))
        ));
        registry.complete_load(&newer, Ok(points(&[1, 2]))).unwrap();
        assert_eq!(registry.layer(&ticket.layer).unwrap().features().unwrap().len(), 2);

        registry.remove_layer(&ticket.layer).unwrap();
        assert!(matches!(
            registry.complete_load(&newer, Ok(points(&[1]))),
            Err(MapError::StaleOperation(_))
        ));
    }

    #[test]
    fn test_failed_load_keeps_visual_partner() {
        let mut registry = registry();
        let ticket = registry
            .begin_hybrid_layer("a:b", "AB", "https://example.org/geoserver/wms", None)
            .unwrap();
        let err = MapError::remote("https://example.org/geoserver/wfs", Some(500), "boom");
        assert!(registry.complete_load(&ticket, Err(err)).is_err());
        assert_eq!(registry.len(), 2);
        assert!(matches!(
            registry.layer(&ticket.layer).unwrap().load_state(),
            LoadState::Failed(_)
        ));
    }

    #[test]
    fn test_symbology_hides_partner_and_failure_changes_nothing() {
        let mut registry = registry();
        let ticket = registry
            .begin_hybrid_layer("a:b", "AB", "https://example.org/geoserver/wms", None)
            .unwrap();
        registry.complete_load(&ticket, Ok(points(&[1, 5, 9, 20]))).unwrap();
        let partner = registry.layer(&ticket.layer).unwrap().visual_partner().cloned().unwrap();

        let bad = SymbologyRequest::Categorized {
            field: "missing".into(),
            ramp: ColorRamp::Reds,
        };
        assert!(matches!(
            registry.set_symbology(&ticket.layer, Some(&bad)),
            Err(MapError::InvalidLayer(_))
        ));
        assert!(registry.layer(&ticket.layer).unwrap().symbology().is_none());
        assert!(registry.layer(&partner).unwrap().is_visible());

        let request = SymbologyRequest::Graduated {
            field: "pop".into(),
            method: ClassificationMethod::Quantile,
            class_count: 2,
            ramp: ColorRamp::Reds,
        };
        registry.set_symbology(&ticket.layer, Some(&request)).unwrap();
        assert!(!registry.layer(&partner).unwrap().is_visible());

        registry.set_symbology(&ticket.layer, None).unwrap();
        assert!(registry.layer(&partner).unwrap().is_visible());
    }

    #[test]
    fn test_tile_layers_cannot_be_styled() {
        let mut registry = registry();
        let id = registry
            .add_layer(
                Layer::raster("NDVI", "https://tiles.example/{z}/{x}/{y}", Default::default()).unwrap(),
                false,
            )
            .unwrap();
        let request = SymbologyRequest::Categorized {
            field: "x".into(),
            ramp: ColorRamp::Reds,
        };
        assert!(matches!(
            registry.set_symbology(&id, Some(&request)),
            Err(MapError::InvalidLayer(_))
        ));
    }

    #[test]
    fn test_unknown_layer() {
        let mut registry = registry();
        assert!(matches!(
            registry.set_visibility(&LayerId::new(), true),
            Err(MapError::LayerNotFound(_))
        ));
    }
}
