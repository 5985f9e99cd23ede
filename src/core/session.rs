//! Editing session façade.
//!
//! Wires the registry, the selection, the statistics engine and the remote
//! client together and turns failures the user should hear about into
//! [`Notice`]s. Every operation still returns its `Result`.

use crate::{
    analysis::stats::{BasicStats, SpatialStatistics, WeightedSum},
    classify::symbology::SymbologyRequest,
    core::{
        config::EngineConfig,
        constants::{base_layer, DEFAULT_BASE_LAYER},
        engine::{Hit, MapEngine},
        geo::{project_geometry_from_lon_lat, Point},
    },
    data::{
        feature::{Attributes, Feature, FeatureCollection},
        formats::DataProcessor,
    },
    layers::{
        base::{Layer, LayerId, LayerKind, Provenance},
        registry::{LayerRegistry, LoadTicket},
    },
    notify::{Broadcaster, Notice},
    remote::{overpass::OverpassQuery, wfs::WfsRequest, OsmCategory, RemoteSource},
    selection::controller::{SelectionChanged, SelectionController, SelectionTool},
    state::{
        codec::{decode, encode},
        document::MapStateDocument,
        reconstruct::{LayerStatus, ReconstructionReport, Reconstructor},
        store::{DocumentId, DocumentStore},
    },
    MapError, Result,
};
use crossbeam_channel::Receiver;
use geo_types::{Geometry, LineString, Polygon};
use std::{collections::BTreeMap, sync::Arc};

/// A feature load begun on a [`MapSession`] and not yet applied. It owns the
/// request, so the fetch future borrows nothing from the session.
#[derive(Debug, Clone)]
pub struct PendingLoad {
    pub ticket: LoadTicket,
    pub request: WfsRequest,
    name: String,
}

impl PendingLoad {
    /// The interactive layer the features are for
    pub fn layer(&self) -> &LayerId {
        &self.ticket.layer
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

pub struct MapSession {
    config: EngineConfig,
    registry: LayerRegistry,
    selection: SelectionController,
    statistics: SpatialStatistics,
    source: Arc<dyn RemoteSource>,
    notices: Broadcaster<Notice>,
    base_layer_id: String,
    subject: String,
    sketches: usize,
}

impl MapSession {
    pub fn new(config: EngineConfig, engine: Box<dyn MapEngine>, source: Arc<dyn RemoteSource>) -> Result<Self> {
        config.validate()?;
        let registry = LayerRegistry::new(engine).with_config(config.classification.clone(), &config.remote);
        Ok(Self {
            selection: SelectionController::new(&config.selection),
            statistics: SpatialStatistics::default(),
            registry,
            source,
            notices: Broadcaster::new(),
            base_layer_id: DEFAULT_BASE_LAYER.to_string(),
            subject: String::new(),
            sketches: 0,
            config,
        })
    }

    /// Replaces the geometry kernel used for weighted sums
    pub fn with_statistics(mut self, statistics: SpatialStatistics) -> Self {
        self.statistics = statistics;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn subscribe_notices(&self) -> Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn subscribe_selection(&self) -> Receiver<SelectionChanged> {
        self.selection.subscribe()
    }

    pub fn base_layer_id(&self) -> &str {
        &self.base_layer_id
    }

    pub fn set_base_layer(&mut self, id: &str) -> Result<()> {
        let spec = base_layer(id)
            .ok_or_else(|| MapError::InvalidLayer(format!("unknown base layer \"{}\"", id)))?;
        self.base_layer_id = spec.id.to_string();
        Ok(())
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn set_subject(&mut self, subject: &str) {
        self.subject = subject.to_string();
    }

    /// Sends a notice for `err` naming `subject`, then hands the error back.
    fn report(&self, err: MapError, subject: &str) -> MapError {
        if err.is_user_visible() {
            self.notices.send(Notice::error(err.user_message(subject)));
        }
        err
    }

    // Layers

    pub fn add_layer(&mut self, layer: Layer, bring_to_front: bool) -> Result<LayerId> {
        self.registry.add_layer(layer, bring_to_front)
    }

    /// Remote client the session fetches through. Cloning it lets a caller
    /// run a [`PendingLoad`] while the session keeps taking edits.
    pub fn remote_source(&self) -> Arc<dyn RemoteSource> {
        Arc::clone(&self.source)
    }

    /// Registers a WMS/WFS pair with an empty interactive half and returns the
    /// feature request still to be run. Finish with [`MapSession::complete_load`].
    pub fn begin_hybrid_layer(
        &mut self,
        remote_layer_name: &str,
        title: &str,
        server_url: &str,
        style_name: Option<&str>,
    ) -> Result<PendingLoad> {
        let ticket = self
            .registry
            .begin_hybrid_layer(remote_layer_name, title, server_url, style_name)
            .map_err(|e| self.report(e, title))?;
        Ok(PendingLoad {
            ticket,
            request: WfsRequest::new(server_url, remote_layer_name, &self.config.remote),
            name: title.to_string(),
        })
    }

    /// Starts fetching the features of a WFS layer again. Loads begun earlier
    /// for the same layer become stale.
    pub fn begin_reload(&mut self, id: &LayerId) -> Result<PendingLoad> {
        let layer = self.registry.layer(id)?;
        let Some(Provenance::Ogc {
            server_url,
            remote_layer_name,
            ..
        }) = layer.provenance()
        else {
            return Err(MapError::InvalidLayer(format!("{} has no remote features", id)));
        };
        let request = WfsRequest::new(server_url, remote_layer_name, &self.config.remote);
        let name = layer.name().to_string();
        let ticket = self.registry.begin_reload(id)?;
        Ok(PendingLoad { ticket, request, name })
    }

    /// Applies the result of a fetch started with `begin_*`.
    ///
    /// A load whose layer was removed or reloaded in the meantime fails with
    /// `StaleOperation`, changes nothing and tells the user nothing. Other
    /// failures leave the layer marked failed and send an error notice.
    pub fn complete_load(&mut self, pending: PendingLoad, result: Result<FeatureCollection>) -> Result<()> {
        let PendingLoad { ticket, name, .. } = pending;
        self.registry.complete_load(&ticket, result).map_err(|e| {
            if e.is_user_visible() {
                self.notices
                    .send(Notice::error(e.user_message(&name)).for_layer(ticket.layer.clone()));
            }
            e
        })
    }

    /// Adds a WMS/WFS pair and loads its features. When the features cannot
    /// be fetched the rendered layer stays on the map, the user is told why
    /// and the layer comes back as `Degraded`.
    pub async fn add_hybrid_layer(
        &mut self,
        remote_layer_name: &str,
        title: &str,
        server_url: &str,
        style_name: Option<&str>,
    ) -> Result<LayerStatus> {
        let pending = self.begin_hybrid_layer(remote_layer_name, title, server_url, style_name)?;
        let layer = pending.layer().clone();
        let result = self.source.fetch_wfs(&pending.request).await;
        match self.complete_load(pending, result) {
            Ok(()) => Ok(LayerStatus::Loaded(layer)),
            Err(e @ MapError::StaleOperation(_)) => Err(e),
            Err(e) => Ok(LayerStatus::Degraded {
                layer,
                reason: e.to_string(),
            }),
        }
    }

    /// Fetches the features of a WFS layer again.
    pub async fn reload_layer(&mut self, id: &LayerId) -> Result<()> {
        let pending = self.begin_reload(id)?;
        let result = self.source.fetch_wfs(&pending.request).await;
        self.complete_load(pending, result)
    }

    /// Removes a layer (and its partner) and drops their features from the selection.
    pub fn remove_layer(&mut self, id: &LayerId) -> Result<Vec<LayerId>> {
        let removed = self.registry.remove_layer(id)?;
        self.selection.layers_removed(&self.registry, &removed);
        Ok(removed)
    }

    pub fn set_visibility(&mut self, id: &LayerId, visible: bool) -> Result<()> {
        self.registry.set_visibility(id, visible)
    }

    pub fn set_opacity(&mut self, id: &LayerId, opacity: f64) -> Result<()> {
        self.registry.set_opacity(id, opacity)
    }

    pub fn set_symbology(&mut self, id: &LayerId, request: Option<&SymbologyRequest>) -> Result<()> {
        self.registry.set_symbology(id, request)
    }

    /// Queries OpenStreetMap inside `polygon` (lon/lat). No matches is not an
    /// error: the user gets a warning and no layer is added.
    pub async fn fetch_osm_data(&mut self, category: OsmCategory, polygon: &[[f64; 2]]) -> Result<Option<LayerId>> {
        let query = OverpassQuery::new(category, polygon.to_vec(), self.config.remote.overpass_query_timeout_s)
            .map_err(|e| self.report(e, category.label()))?;
        let features = self
            .source
            .fetch_overpass(&query)
            .await
            .map_err(|e| self.report(e, category.label()))?;

        if features.is_empty() {
            log::info!("no {} found in the drawn area", category.id());
            self.notices.send(Notice::warning(format!(
                "No {} found in the selected area",
                category.label().to_lowercase()
            )));
            return Ok(None);
        }
        let count = features.len();
        let id = self
            .registry
            .add_layer(Layer::vector(category.label(), LayerKind::Osm, features), true)?;
        self.notices
            .send(Notice::info(format!("Added {} {}", count, category.label().to_lowercase())).for_layer(id.clone()));
        Ok(Some(id))
    }

    /// Adds an uploaded GeoJSON or KML file as a `local-upload` layer.
    pub fn add_upload(&mut self, name: &str, text: &str) -> Result<LayerId> {
        let features = DataProcessor::parse(text, name).map_err(|e| self.report(e, name))?;
        self.registry
            .add_layer(Layer::vector(name, LayerKind::LocalUpload, features), true)
    }

    /// Stores a user sketch (lon/lat ring) on the drawing layer, creating it
    /// on first use.
    pub fn add_drawing(&mut self, polygon: &[[f64; 2]]) -> Result<LayerId> {
        if polygon.len() < 3 {
            return Err(MapError::InvalidLayer("a sketch needs at least three points".into()));
        }
        let ring: LineString<f64> = polygon.iter().map(|[lon, lat]| (*lon, *lat)).collect();
        let geometry = project_geometry_from_lon_lat(&Geometry::Polygon(Polygon::new(ring, Vec::new())));
        self.sketches += 1;
        let sketch = Feature::new(format!("sketch-{}", self.sketches), geometry, Attributes::new());

        match self.registry.drawing_layer().map(|l| l.id().clone()) {
            Some(id) => {
                self.registry.append_features(&id, vec![sketch])?;
                Ok(id)
            }
            None => self
                .registry
                .add_layer(Layer::drawing(FeatureCollection::new(vec![sketch])), true),
        }
    }

    pub fn add_raster_analysis(
        &mut self,
        name: &str,
        url_template: &str,
        params: BTreeMap<String, String>,
    ) -> Result<LayerId> {
        let layer = Layer::raster(name, url_template, params)?;
        self.registry.add_layer(layer, true)
    }

    /// Fits the view to a layer's features. A partner id resolves to the
    /// layer that owns it.
    pub fn zoom_to_layer(&mut self, id: &LayerId) -> Result<()> {
        let owner = self.registry.owner_of(id).cloned().unwrap_or_else(|| id.clone());
        let layer = self.registry.layer(&owner)?;
        let extent = layer.extent().ok_or_else(|| {
            MapError::InvalidLayer(format!("\"{}\" has no features to zoom to", layer.name()))
        })?;
        self.registry.engine_mut().fit_view(&extent);
        Ok(())
    }

    // Selection

    pub fn set_active_tool(&mut self, tool: SelectionTool) {
        self.selection.set_active_tool(&self.registry, tool);
    }

    pub fn click(&mut self, pixel: Point) -> Result<()> {
        self.selection.click(&self.registry, pixel)
    }

    pub fn start_drag(&mut self, pixel: Point) {
        self.selection.start_drag(pixel);
    }

    pub fn finish_drag(&mut self, pixel: Point) -> Result<()> {
        self.selection.finish_drag(&self.registry, pixel)
    }

    pub fn select_features_by_id(&mut self, ids: &[Hit]) {
        self.selection.select_features_by_id(&self.registry, ids);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear_selection(&self.registry);
    }

    // Statistics

    /// Selected features of `layer`, or all of them when none is selected
    fn analysis_features(&self, layer: &LayerId) -> Result<Vec<&Feature>> {
        let target = self.registry.layer(layer)?;
        let features = target.features().ok_or_else(|| {
            MapError::InvalidLayer(format!("\"{}\" has no features to analyse", target.name()))
        })?;
        let selected = self.selection.selected_features(&self.registry, layer);
        Ok(if selected.is_empty() {
            features.iter().collect()
        } else {
            selected
        })
    }

    pub fn basic_stats(&self, layer: &LayerId, field: &str) -> Result<BasicStats> {
        let features = self.analysis_features(layer)?;
        self.statistics.basic_stats(features, field)
    }

    /// Area-weighted sum of `field` over the part of `layer` inside `clip`
    /// (map projection).
    pub fn weighted_sum(&self, layer: &LayerId, clip: &Geometry<f64>, field: &str) -> Result<WeightedSum> {
        let features = self.analysis_features(layer)?;
        self.statistics.weighted_sum(features, clip, field)
    }

    // Sharing

    pub fn snapshot(&self) -> MapStateDocument {
        encode(
            &self.registry,
            self.registry.engine().view(),
            &self.base_layer_id,
            &self.subject,
        )
    }

    pub async fn share(&self, store: &dyn DocumentStore) -> Result<DocumentId> {
        let document = self.snapshot();
        store.save(&document).await.map_err(|e| self.report(e, &self.subject))
    }

    /// Rebuilds a shared map into this session. Entries that fail are
    /// reported per layer, with a warning notice each.
    pub async fn open_document(&mut self, document: &MapStateDocument) -> ReconstructionReport {
        let plan = decode(document);
        let report = Reconstructor::new(self.source.as_ref(), &self.config.remote)
            .run(&plan, &mut self.registry)
            .await;
        self.base_layer_id = report.base_layer_id.clone();
        self.subject = report.subject.clone();

        for failure in report.failures() {
            let notice = Notice::warning(format!("\"{}\" could not be fully loaded", failure.name));
            match &failure.status {
                LayerStatus::Degraded { layer, .. } => self.notices.send(notice.for_layer(layer.clone())),
                _ => self.notices.send(notice),
            }
        }
        report
    }
}
