use crate::{
    classify::symbology::Symbology,
    core::{
        constants::{base_layer, DEFAULT_BASE_LAYER},
        view::MapView,
    },
    layers::{
        base::{Layer, LayerKind, Provenance},
        registry::LayerRegistry,
    },
    remote::proxy::parse_service_url,
    state::document::{MapStateDocument, RemoteKind, RemoteLayer, SerializableLayer},
};
use std::collections::BTreeMap;

/// Snapshots the registry bottom to top. Visual partners are folded into
/// the entry of the layer that owns them.
pub fn encode(registry: &LayerRegistry, view: MapView, base_layer_id: &str, subject: &str) -> MapStateDocument {
    let layers = registry
        .ordered()
        .into_iter()
        .filter(|layer| registry.owner_of(layer.id()).is_none())
        .map(serialize_layer)
        .collect();

    MapStateDocument {
        subject: subject.to_string(),
        view,
        base_layer_id: base_layer_id.to_string(),
        layers,
    }
}

fn serialize_layer(layer: &Layer) -> SerializableLayer {
    let remote = |kind: RemoteKind, source_url: &str, remote_layer_name: &str| RemoteLayer {
        kind,
        name: layer.name().to_string(),
        source_url: source_url.to_string(),
        remote_layer_name: remote_layer_name.to_string(),
        opacity: layer.opacity(),
        visible: layer.is_visible(),
        style_name: None,
        tile_params: None,
        interactive: false,
        symbology: layer.symbology().cloned(),
    };

    match (layer.kind(), layer.provenance()) {
        (
            kind @ (LayerKind::Wms | LayerKind::Wfs),
            Some(Provenance::Ogc {
                server_url,
                remote_layer_name,
                style_name,
            }),
        ) => {
            let hybrid = layer.visual_partner().is_some();
            let kind = if kind == LayerKind::Wms || hybrid {
                RemoteKind::Wms
            } else {
                RemoteKind::Wfs
            };
            SerializableLayer::Remote(RemoteLayer {
                style_name: style_name.clone(),
                interactive: hybrid,
                ..remote(kind, server_url.as_str(), remote_layer_name.as_str())
            })
        }
        (_, Some(Provenance::Tiles { url_template, params })) => SerializableLayer::Remote(RemoteLayer {
            tile_params: Some(params.clone()),
            ..remote(RemoteKind::Gee, url_template.as_str(), "")
        }),
        _ => SerializableLayer::LocalPlaceholder {
            name: layer.name().to_string(),
        },
    }
}

/// What to rebuild for one document entry
#[derive(Debug, Clone, PartialEq)]
pub enum ReconstructionStep {
    /// WMS partner plus WFS features
    Hybrid {
        server_url: String,
        remote_layer_name: String,
        style_name: Option<String>,
        symbology: Option<Symbology>,
    },
    Wms {
        server_url: String,
        remote_layer_name: String,
        style_name: Option<String>,
    },
    Wfs {
        server_url: String,
        remote_layer_name: String,
        style_name: Option<String>,
        symbology: Option<Symbology>,
    },
    RasterTiles {
        url_template: String,
        params: BTreeMap<String, String>,
    },
    Placeholder,
    /// The entry cannot be rebuilt; reported, never attempted
    Invalid { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedLayer {
    /// Position in the document, bottom to top
    pub index: usize,
    pub name: String,
    pub visible: bool,
    pub opacity: f64,
    pub step: ReconstructionStep,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructionPlan {
    pub subject: String,
    pub view: MapView,
    pub base_layer_id: String,
    pub layers: Vec<PlannedLayer>,
}

/// Turns a document into independent per-layer steps. Never fails as a
/// whole: entries that cannot be rebuilt become `Invalid` steps.
pub fn decode(document: &MapStateDocument) -> ReconstructionPlan {
    let base_layer_id = match base_layer(&document.base_layer_id) {
        Some(spec) => spec.id.to_string(),
        None => {
            log::warn!(
                "unknown base layer \"{}\", using \"{}\"",
                document.base_layer_id,
                DEFAULT_BASE_LAYER
            );
            DEFAULT_BASE_LAYER.to_string()
        }
    };

    let layers = document
        .layers
        .iter()
        .enumerate()
        .map(|(index, entry)| plan_layer(index, entry))
        .collect();

    ReconstructionPlan {
        subject: document.subject.clone(),
        view: MapView::new(document.view.center[0], document.view.center[1], document.view.zoom),
        base_layer_id,
        layers,
    }
}

fn plan_layer(index: usize, entry: &SerializableLayer) -> PlannedLayer {
    let remote = match entry {
        SerializableLayer::LocalPlaceholder { name } => {
            return PlannedLayer {
                index,
                name: name.clone(),
                visible: false,
                opacity: 1.0,
                step: ReconstructionStep::Placeholder,
            }
        }
        SerializableLayer::Remote(remote) => remote,
    };

    PlannedLayer {
        index,
        name: remote.name.clone(),
        visible: remote.visible,
        opacity: if remote.opacity.is_finite() {
            remote.opacity.clamp(0.0, 1.0)
        } else {
            1.0
        },
        step: plan_remote(remote).unwrap_or_else(|reason| ReconstructionStep::Invalid { reason }),
    }
}

fn plan_remote(remote: &RemoteLayer) -> std::result::Result<ReconstructionStep, String> {
    if remote.kind == RemoteKind::Gee {
        if remote.source_url.trim().is_empty() {
            return Err("tile layer has no URL template".into());
        }
        return Ok(ReconstructionStep::RasterTiles {
            url_template: remote.source_url.clone(),
            params: remote.tile_params.clone().unwrap_or_default(),
        });
    }

    parse_service_url(&remote.source_url).map_err(|e| e.to_string())?;
    if remote.remote_layer_name.trim().is_empty() {
        return Err("no remote layer name".into());
    }
    let server_url = remote.source_url.clone();
    let remote_layer_name = remote.remote_layer_name.clone();
    let style_name = remote.style_name.clone();

    Ok(match (remote.kind, remote.interactive) {
        (RemoteKind::Wms, true) => ReconstructionStep::Hybrid {
            server_url,
            remote_layer_name,
            style_name,
            symbology: remote.symbology.clone(),
        },
        (RemoteKind::Wfs, _) => ReconstructionStep::Wfs {
            server_url,
            remote_layer_name,
            style_name,
            symbology: remote.symbology.clone(),
        },
        _ => ReconstructionStep::Wms {
            server_url,
            remote_layer_name,
            style_name,
        },
    })
}
