use crate::{
    classify::symbology::Symbology,
    core::{bounds::Bounds, engine::RenderState},
    data::feature::{FeatureCollection, GeometryKind},
    tiles::source::{TileSpec, WmsTileSource, XyzTileSource},
    Result,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU64, Ordering},
};

static NEXT_LAYER_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque layer identifier, unique for the process lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(String);

impl LayerId {
    pub fn new() -> Self {
        Self(format!("layer-{}", NEXT_LAYER_ID.fetch_add(1, Ordering::Relaxed)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerKind {
    Wms,
    Wfs,
    Vector,
    Osm,
    Drawing,
    RasterAnalysis,
    LocalUpload,
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerKind::Wms => write!(f, "wms"),
            LayerKind::Wfs => write!(f, "wfs"),
            LayerKind::Vector => write!(f, "vector"),
            LayerKind::Osm => write!(f, "osm"),
            LayerKind::Drawing => write!(f, "drawing"),
            LayerKind::RasterAnalysis => write!(f, "raster-analysis"),
            LayerKind::LocalUpload => write!(f, "local-upload"),
        }
    }
}

/// Where a layer came from, kept so it can be rebuilt from a shared document
#[derive(Debug, Clone, PartialEq)]
pub enum Provenance {
    /// An OGC (WMS/WFS) service layer
    Ogc {
        server_url: String,
        remote_layer_name: String,
        style_name: Option<String>,
    },
    /// A templated tile endpoint
    Tiles {
        url_template: String,
        params: BTreeMap<String, String>,
    },
}

/// Base drawing style. The interactive half of a hybrid layer is drawn
/// `Minimal` so its WMS partner is what the user sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerStyle {
    #[default]
    Standard,
    Minimal,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum LoadState {
    #[default]
    Ready,
    Pending,
    Failed(String),
}

/// A layer managed by the registry.
///
/// Fields are private: visibility, opacity, symbology and partner links only
/// change through [`crate::layers::registry::LayerRegistry`].
#[derive(Debug, Clone)]
pub struct Layer {
    id: LayerId,
    name: String,
    kind: LayerKind,
    visible: bool,
    opacity: f64,
    symbology: Option<Symbology>,
    visual_partner: Option<LayerId>,
    provenance: Option<Provenance>,
    features: Option<FeatureCollection>,
    tiles: Option<TileSpec>,
    style: LayerStyle,
    load_state: LoadState,
    generation: u64,
}

impl Layer {
    fn base(name: &str, kind: LayerKind) -> Self {
        Self {
            id: LayerId::new(),
            name: name.to_string(),
            kind,
            visible: true,
            opacity: 1.0,
            symbology: None,
            visual_partner: None,
            provenance: None,
            features: None,
            tiles: None,
            style: LayerStyle::Standard,
            load_state: LoadState::Ready,
            generation: 0,
        }
    }

    /// Feature-bearing layer (vector, osm, upload, drawing...)
    pub fn vector(name: &str, kind: LayerKind, features: FeatureCollection) -> Self {
        let mut layer = Self::base(name, kind);
        layer.features = Some(features);
        layer
    }

    pub fn drawing(features: FeatureCollection) -> Self {
        Self::vector("Drawings", LayerKind::Drawing, features)
    }

    /// WMS tile layer
    pub fn wms(
        name: &str,
        server_url: &str,
        remote_layer_name: &str,
        style_name: Option<&str>,
        proxy: Option<String>,
    ) -> Result<Self> {
        let source = WmsTileSource::new(server_url, remote_layer_name, style_name, proxy)?;
        let mut layer = Self::base(name, LayerKind::Wms);
        layer.tiles = Some(TileSpec::Wms(source));
        layer.provenance = Some(Provenance::Ogc {
            server_url: server_url.to_string(),
            remote_layer_name: remote_layer_name.to_string(),
            style_name: style_name.map(str::to_string),
        });
        Ok(layer)
    }

    /// Interactive WFS layer whose features arrive later
    pub fn wfs_pending(
        name: &str,
        server_url: &str,
        remote_layer_name: &str,
        style_name: Option<&str>,
    ) -> Self {
        let mut layer = Self::base(name, LayerKind::Wfs);
        layer.features = Some(FeatureCollection::default());
        layer.load_state = LoadState::Pending;
        layer.style = LayerStyle::Minimal;
        layer.provenance = Some(Provenance::Ogc {
            server_url: server_url.to_string(),
            remote_layer_name: remote_layer_name.to_string(),
            style_name: style_name.map(str::to_string),
        });
        layer
    }

    /// Visual (WMS) and interactive (WFS) halves of one remote dataset,
    /// already linked. The interactive half starts empty and pending.
    pub fn hybrid_pair(
        name: &str,
        server_url: &str,
        remote_layer_name: &str,
        style_name: Option<&str>,
        proxy: Option<String>,
    ) -> Result<(Self, Self)> {
        let visual = Self::wms(name, server_url, remote_layer_name, style_name, proxy)?;
        let mut interactive = Self::wfs_pending(name, server_url, remote_layer_name, style_name);
        interactive.visual_partner = Some(visual.id.clone());
        Ok((visual, interactive))
    }

    /// Raster analysis tiles from a `{z}/{x}/{y}` template
    pub fn raster(name: &str, url_template: &str, params: BTreeMap<String, String>) -> Result<Self> {
        let source = XyzTileSource::new(url_template, params.clone())?;
        let mut layer = Self::base(name, LayerKind::RasterAnalysis);
        layer.tiles = Some(TileSpec::Xyz(source));
        layer.provenance = Some(Provenance::Tiles {
            url_template: url_template.to_string(),
            params,
        });
        Ok(layer)
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = clamp_opacity(opacity);
        self
    }

    pub fn id(&self) -> &LayerId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    pub fn symbology(&self) -> Option<&Symbology> {
        self.symbology.as_ref()
    }

    pub fn visual_partner(&self) -> Option<&LayerId> {
        self.visual_partner.as_ref()
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    pub fn features(&self) -> Option<&FeatureCollection> {
        self.features.as_ref()
    }

    pub fn tiles(&self) -> Option<&TileSpec> {
        self.tiles.as_ref()
    }

    pub fn style(&self) -> LayerStyle {
        self.style
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_features(&self) -> bool {
        self.features.is_some()
    }

    /// Selectable layers carry features and are not user sketches.
    pub fn is_selectable(&self) -> bool {
        self.has_features() && self.kind != LayerKind::Drawing
    }

    pub fn geometry_kinds(&self) -> Vec<GeometryKind> {
        self.features.as_ref().map(FeatureCollection::kinds).unwrap_or_default()
    }

    pub fn extent(&self) -> Option<Bounds> {
        self.features.as_ref().and_then(FeatureCollection::extent)
    }

    pub(crate) fn render_state(&self, z_index: usize) -> RenderState {
        RenderState {
            visible: self.visible,
            opacity: self.opacity,
            z_index,
            style: self.style,
            symbology: self.symbology.clone(),
        }
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub(crate) fn set_opacity(&mut self, opacity: f64) {
        self.opacity = clamp_opacity(opacity);
    }

    pub(crate) fn set_symbology(&mut self, symbology: Option<Symbology>) {
        self.symbology = symbology;
    }

    pub(crate) fn set_features(&mut self, features: FeatureCollection) {
        self.features = Some(features);
    }

    pub(crate) fn features_mut(&mut self) -> Option<&mut FeatureCollection> {
        self.features.as_mut()
    }

    pub(crate) fn set_style(&mut self, style: LayerStyle) {
        self.style = style;
    }

    pub(crate) fn set_load_state(&mut self, state: LoadState) {
        self.load_state = state;
    }

    pub(crate) fn bump_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}

fn clamp_opacity(opacity: f64) -> f64 {
    if opacity.is_finite() {
        opacity.clamp(0.0, 1.0)
    } else {
        1.0
    }
}
