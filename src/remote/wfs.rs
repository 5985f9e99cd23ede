use crate::{
    core::{
        bounds::Bounds,
        config::RemoteConfig,
        constants::{MAP_SRS, WFS_OUTPUT_FORMAT, WFS_VERSION},
    },
    remote::proxy::parse_service_url,
    Result,
};
use reqwest::Url;

/// A WFS GetFeature request for one feature type
#[derive(Debug, Clone, PartialEq)]
pub struct WfsRequest {
    pub server_url: String,
    pub type_name: String,
    pub srs_name: String,
    pub bbox: Option<Bounds>,
    pub max_features: Option<u32>,
}

impl WfsRequest {
    pub fn new(server_url: &str, type_name: &str, config: &RemoteConfig) -> Self {
        Self {
            server_url: server_url.to_string(),
            type_name: type_name.to_string(),
            srs_name: config.wfs_srs.clone(),
            bbox: None,
            max_features: config.wfs_max_features,
        }
    }

    pub fn with_bbox(mut self, bbox: Bounds) -> Self {
        self.bbox = Some(bbox);
        self
    }

    /// Whether the response geometry is already in the map projection
    pub fn in_map_srs(&self) -> bool {
        self.srs_name == MAP_SRS
    }

    /// Full GetFeature URL. GeoServer-style `/wms` endpoints are switched to
    /// their `/wfs` sibling, since hybrid layers are registered with the WMS
    /// address.
    pub fn to_url(&self) -> Result<Url> {
        let mut url = parse_service_url(&self.server_url)?;
        if let Some(prefix) = url.path().strip_suffix("/wms") {
            let path = format!("{}/wfs", prefix);
            url.set_path(&path);
        }
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("service", "WFS")
                .append_pair("version", WFS_VERSION)
                .append_pair("request", "GetFeature")
                .append_pair("typename", &self.type_name)
                .append_pair("outputFormat", WFS_OUTPUT_FORMAT)
                .append_pair("srsname", &self.srs_name);
            if let Some(bbox) = &self.bbox {
                pairs.append_pair(
                    "bbox",
                    &format!(
                        "{},{},{},{},{}",
                        bbox.min.x, bbox.min.y, bbox.max.x, bbox.max.y, self.srs_name
                    ),
                );
            }
            if let Some(max) = self.max_features {
                pairs.append_pair("maxFeatures", &max.to_string());
            }
        }
        Ok(url)
    }
}
