//! Executes a reconstruction plan.
//!
//! Every entry is prepared independently and concurrently: remote features
//! are fetched, layers are built, failures are kept per entry. Completed
//! entries are inserted as they arrive, each directly below the closest
//! already placed entry that comes later in the document, so the final
//! z-order matches the document whatever order the fetches finish in.

use crate::{
    classify::symbology::Symbology,
    core::config::RemoteConfig,
    layers::{
        base::{Layer, LayerId, LayerStyle, LoadState},
        registry::LayerRegistry,
    },
    remote::{wfs::WfsRequest, RemoteSource},
    state::codec::{PlannedLayer, ReconstructionPlan, ReconstructionStep},
    MapError, Result,
};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum LayerStatus {
    Loaded(LayerId),
    /// On the map, but incomplete (e.g. a hybrid layer without its features)
    Degraded { layer: LayerId, reason: String },
    Unavailable { reason: String },
    /// Session-only layer, shown disabled
    Placeholder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerReport {
    pub index: usize,
    pub name: String,
    pub status: LayerStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructionReport {
    pub subject: String,
    pub base_layer_id: String,
    /// In document order
    pub layers: Vec<LayerReport>,
}

impl ReconstructionReport {
    pub fn loaded(&self) -> usize {
        self.layers
            .iter()
            .filter(|r| matches!(r.status, LayerStatus::Loaded(_)))
            .count()
    }

    /// Entries that did not fully load, placeholders excluded
    pub fn failures(&self) -> impl Iterator<Item = &LayerReport> {
        self.layers.iter().filter(|r| {
            matches!(
                r.status,
                LayerStatus::Degraded { .. } | LayerStatus::Unavailable { .. }
            )
        })
    }

    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// A finished entry waiting to be inserted
enum Prepared {
    Single {
        layer: Layer,
        symbology: Option<Symbology>,
    },
    Pair {
        visual: Layer,
        interactive: Layer,
        symbology: Option<Symbology>,
        error: Option<MapError>,
    },
    Placeholder,
}

pub struct Reconstructor<'a> {
    source: &'a dyn RemoteSource,
    remote: &'a RemoteConfig,
}

impl<'a> Reconstructor<'a> {
    pub fn new(source: &'a dyn RemoteSource, remote: &'a RemoteConfig) -> Self {
        Self { source, remote }
    }

    /// Rebuilds `plan` into `registry` and sets the engine view. One entry
    /// failing never stops the others.
    pub async fn run(&self, plan: &ReconstructionPlan, registry: &mut LayerRegistry) -> ReconstructionReport {
        registry.engine_mut().set_view(plan.view);
        let proxy = registry.proxy_url().map(str::to_string);

        let mut pending: FuturesUnordered<_> = plan
            .layers
            .iter()
            .map(|planned| {
                let proxy = proxy.clone();
                async move { (planned, self.prepare(planned, proxy).await) }
            })
            .collect();

        // document index -> bottom-most layer placed for that entry
        let mut placed: BTreeMap<usize, LayerId> = BTreeMap::new();
        let mut reports = Vec::with_capacity(plan.layers.len());

        while let Some((planned, prepared)) = pending.next().await {
            let status = match prepared {
                Ok(prepared) => {
                    let anchor = placed.range(planned.index + 1..).next().map(|(_, id)| id.clone());
                    place(registry, prepared, anchor.as_ref(), planned.index, &mut placed)
                }
                Err(e) => LayerStatus::Unavailable { reason: e.to_string() },
            };
            match &status {
                LayerStatus::Degraded { reason, .. } | LayerStatus::Unavailable { reason } => {
                    log::warn!("layer {} \"{}\": {}", planned.index, planned.name, reason)
                }
                LayerStatus::Loaded(id) => log::debug!("layer {} \"{}\" loaded as {}", planned.index, planned.name, id),
                LayerStatus::Placeholder => {}
            }
            reports.push(LayerReport {
                index: planned.index,
                name: planned.name.clone(),
                status,
            });
        }

        reports.sort_by_key(|r| r.index);
        ReconstructionReport {
            subject: plan.subject.clone(),
            base_layer_id: plan.base_layer_id.clone(),
            layers: reports,
        }
    }

    async fn prepare(&self, planned: &PlannedLayer, proxy: Option<String>) -> Result<Prepared> {
        let appearance = |layer: Layer| layer.with_visible(planned.visible).with_opacity(planned.opacity);

        match &planned.step {
            ReconstructionStep::Hybrid {
                server_url,
                remote_layer_name,
                style_name,
                symbology,
            } => {
                let (visual, interactive) =
                    Layer::hybrid_pair(&planned.name, server_url, remote_layer_name, style_name.as_deref(), proxy)?;
                let mut interactive = appearance(interactive);
                let error = match self.fetch(server_url, remote_layer_name).await {
                    Ok(features) => {
                        interactive.set_features(features);
                        interactive.set_load_state(LoadState::Ready);
                        None
                    }
                    Err(e) => {
                        interactive.set_load_state(LoadState::Failed(e.to_string()));
                        Some(e)
                    }
                };
                Ok(Prepared::Pair {
                    visual: appearance(visual),
                    interactive,
                    symbology: symbology.clone(),
                    error,
                })
            }
            ReconstructionStep::Wfs {
                server_url,
                remote_layer_name,
                style_name,
                symbology,
            } => {
                let features = self.fetch(server_url, remote_layer_name).await?;
                let mut layer = appearance(Layer::wfs_pending(
                    &planned.name,
                    server_url,
                    remote_layer_name,
                    style_name.as_deref(),
                ));
                layer.set_features(features);
                layer.set_load_state(LoadState::Ready);
                layer.set_style(LayerStyle::Standard);
                Ok(Prepared::Single {
                    layer,
                    symbology: symbology.clone(),
                })
            }
            ReconstructionStep::Wms {
                server_url,
                remote_layer_name,
                style_name,
            } => Ok(Prepared::Single {
                layer: appearance(Layer::wms(
                    &planned.name,
                    server_url,
                    remote_layer_name,
                    style_name.as_deref(),
                    proxy,
                )?),
                symbology: None,
            }),
            ReconstructionStep::RasterTiles { url_template, params } => Ok(Prepared::Single {
                layer: appearance(Layer::raster(&planned.name, url_template, params.clone())?),
                symbology: None,
            }),
            ReconstructionStep::Placeholder => Ok(Prepared::Placeholder),
            ReconstructionStep::Invalid { reason } => Err(MapError::InvalidLayer(reason.clone())),
        }
    }

    async fn fetch(&self, server_url: &str, remote_layer_name: &str) -> Result<crate::data::feature::FeatureCollection> {
        let request = WfsRequest::new(server_url, remote_layer_name, self.remote);
        self.source.fetch_wfs(&request).await
    }
}

fn place(
    registry: &mut LayerRegistry,
    prepared: Prepared,
    anchor: Option<&LayerId>,
    index: usize,
    placed: &mut BTreeMap<usize, LayerId>,
) -> LayerStatus {
    match prepared {
        Prepared::Placeholder => LayerStatus::Placeholder,
        Prepared::Single { layer, symbology } => match registry.insert_below(layer, anchor) {
            Ok(id) => {
                placed.insert(index, id.clone());
                restyle(registry, id, symbology)
            }
            Err(e) => LayerStatus::Unavailable { reason: e.to_string() },
        },
        Prepared::Pair {
            visual,
            interactive,
            symbology,
            error,
        } => {
            let visual_id = visual.id().clone();
            match registry.insert_pair_below(visual, interactive, anchor) {
                Ok(id) => {
                    placed.insert(index, visual_id);
                    match error {
                        Some(e) => LayerStatus::Degraded {
                            layer: id,
                            reason: format!("features unavailable, showing the rendered layer only: {}", e),
                        },
                        None => restyle(registry, id, symbology),
                    }
                }
                Err(e) => LayerStatus::Unavailable { reason: e.to_string() },
            }
        }
    }
}

fn restyle(registry: &mut LayerRegistry, id: LayerId, symbology: Option<Symbology>) -> LayerStatus {
    let Some(symbology) = symbology else {
        return LayerStatus::Loaded(id);
    };
    match registry.restore_symbology(&id, symbology) {
        Ok(()) => LayerStatus::Loaded(id),
        Err(e) => LayerStatus::Degraded {
            layer: id,
            reason: format!("style could not be restored: {}", e),
        },
    }
}
