use crate::{
    core::{
        constants::{TILE_SIZE, WMS_VERSION, MAP_SRS},
        geo::TileCoord,
    },
    remote::proxy::{parse_service_url, proxied},
    Result,
};
use reqwest::Url;
use std::collections::BTreeMap;

/// Trait representing anything that can produce tile URLs for a given coordinate.
///
/// A URL that cannot be built yields `None`; tile failures render as empty
/// tiles and are never surfaced as layer errors.
pub trait TileSource: Send + Sync {
    /// Build a URL for the requested `coord`.
    fn url(&self, coord: TileCoord) -> Option<String>;
}

/// WMS 1.1.1 GetMap tiles in the map projection.
#[derive(Debug, Clone, PartialEq)]
pub struct WmsTileSource {
    server_url: Url,
    layers: String,
    styles: String,
    proxy: Option<String>,
}

impl WmsTileSource {
    pub fn new(server_url: &str, layers: &str, style: Option<&str>, proxy: Option<String>) -> Result<Self> {
        Ok(Self {
            server_url: parse_service_url(server_url)?,
            layers: layers.to_string(),
            styles: style.unwrap_or_default().to_string(),
            proxy,
        })
    }

    pub fn server_url(&self) -> &Url {
        &self.server_url
    }

    fn upstream(&self, coord: TileCoord) -> Url {
        let [min_x, min_y, max_x, max_y] = coord.mercator_bbox();
        let size = TILE_SIZE.to_string();
        let mut url = self.server_url.clone();
        url.query_pairs_mut()
            .append_pair("SERVICE", "WMS")
            .append_pair("REQUEST", "GetMap")
            .append_pair("VERSION", WMS_VERSION)
            .append_pair("LAYERS", &self.layers)
            .append_pair("STYLES", &self.styles)
            .append_pair("FORMAT", "image/png")
            .append_pair("TRANSPARENT", "true")
            .append_pair("SRS", MAP_SRS)
            .append_pair("WIDTH", &size)
            .append_pair("HEIGHT", &size)
            .append_pair("BBOX", &format!("{},{},{},{}", min_x, min_y, max_x, max_y));
        url
    }
}

impl TileSource for WmsTileSource {
    fn url(&self, coord: TileCoord) -> Option<String> {
        if !coord.is_valid() {
            return None;
        }
        match proxied(&self.upstream(coord), self.proxy.as_deref()) {
            Ok(url) => Some(url.into()),
            Err(e) => {
                log::debug!("no tile url for {:?}: {}", coord, e);
                None
            }
        }
    }
}

/// `{z}/{x}/{y}` template tiles, used for raster analysis results.
#[derive(Debug, Clone, PartialEq)]
pub struct XyzTileSource {
    template: String,
    params: BTreeMap<String, String>,
}

impl XyzTileSource {
    pub fn new(template: &str, params: BTreeMap<String, String>) -> Result<Self> {
        // Validate against a concrete tile so placeholders don't trip the parser.
        parse_service_url(&fill_template(template, TileCoord::new(0, 0, 0)))?;
        Ok(Self {
            template: template.to_string(),
            params,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }
}

fn fill_template(template: &str, coord: TileCoord) -> String {
    template
        .replace("{z}", &coord.z.to_string())
        .replace("{x}", &coord.x.to_string())
        .replace("{y}", &coord.y.to_string())
}

impl TileSource for XyzTileSource {
    fn url(&self, coord: TileCoord) -> Option<String> {
        if !coord.is_valid() {
            return None;
        }
        let mut url = Url::parse(&fill_template(&self.template, coord)).ok()?;
        if !self.params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.params {
                pairs.append_pair(key, value);
            }
        }
        Some(url.into())
    }
}

/// Tile-backed content of a layer
#[derive(Debug, Clone, PartialEq)]
pub enum TileSpec {
    Wms(WmsTileSource),
    Xyz(XyzTileSource),
}

impl TileSource for TileSpec {
    fn url(&self, coord: TileCoord) -> Option<String> {
        match self {
            TileSpec::Wms(source) => source.url(coord),
            TileSpec::Xyz(source) => source.url(coord),
        }
    }
}
