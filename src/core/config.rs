//! Configuration for the remote client, selection and classification
//!
//! Like the rest of the engine, configuration comes as plain structs with
//! presets (`Default`, `for_testing`). Every struct is serde-enabled so a
//! viewer can load overrides from a JSON file.

use crate::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub remote: RemoteConfig,
    pub selection: SelectionConfig,
    pub classification: ClassificationConfig,
}

impl EngineConfig {
    /// Preset for unit and integration tests: no proxy, no backoff waits,
    /// small pages.
    pub fn for_testing() -> Self {
        Self {
            remote: RemoteConfig::for_testing(),
            selection: SelectionConfig {
                hit_tolerance_px: 3.0,
                page_size: 10,
            },
            classification: ClassificationConfig::default(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.remote.validate()?;
        if self.selection.page_size == 0 {
            return Err(MapError::Config("selection.page_size must be > 0".into()));
        }
        if !(self.selection.hit_tolerance_px >= 0.0) {
            return Err(MapError::Config(
                "selection.hit_tolerance_px must be a non-negative number".into(),
            ));
        }
        let c = &self.classification;
        if c.natural_breaks_max_iterations == 0 {
            return Err(MapError::Config(
                "classification.natural_breaks_max_iterations must be > 0".into(),
            ));
        }
        if !(c.natural_breaks_epsilon >= 0.0) {
            return Err(MapError::Config(
                "classification.natural_breaks_epsilon must be >= 0".into(),
            ));
        }
        if c.field_sample_size == 0 {
            return Err(MapError::Config(
                "classification.field_sample_size must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Settings for the remote source client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Same-origin proxy; upstream URLs are passed in its `url` query parameter
    pub proxy_url: Option<String>,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Overpass interpreter endpoint
    pub overpass_url: String,
    /// Retries after a 504/429 from Overpass
    pub overpass_max_retries: u32,
    /// Fixed delay between Overpass retries
    pub overpass_retry_delay_ms: u64,
    /// Overpass server-side timeout in seconds, written into the query
    pub overpass_query_timeout_s: u32,
    /// SRS requested from WFS endpoints (the map's working projection)
    pub wfs_srs: String,
    /// Upper bound on features requested per WFS call
    pub wfs_max_features: Option<u32>,
    /// `User-Agent` header sent with every request; Overpass asks clients to identify themselves
    pub user_agent: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            proxy_url: None,
            request_timeout_ms: 30_000,
            overpass_url: "https://overpass-api.de/api/interpreter".to_string(),
            overpass_max_retries: 3,
            overpass_retry_delay_ms: 2_000,
            overpass_query_timeout_s: 25,
            wfs_srs: crate::core::constants::MAP_SRS.to_string(),
            wfs_max_features: Some(5_000),
            user_agent: concat!("geocompose/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl RemoteConfig {
    pub fn for_testing() -> Self {
        Self {
            request_timeout_ms: 2_000,
            overpass_max_retries: 2,
            overpass_retry_delay_ms: 0,
            ..Default::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn overpass_retry_delay(&self) -> Duration {
        Duration::from_millis(self.overpass_retry_delay_ms)
    }

    fn validate(&self) -> Result<()> {
        if let Some(proxy) = &self.proxy_url {
            reqwest::Url::parse(proxy)
                .map_err(|e| MapError::Config(format!("invalid proxy_url {}: {}", proxy, e)))?;
        }
        reqwest::Url::parse(&self.overpass_url).map_err(|e| {
            MapError::Config(format!("invalid overpass_url {}: {}", self.overpass_url, e))
        })?;
        if self.request_timeout_ms == 0 {
            return Err(MapError::Config("remote.request_timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Click tolerance around the pointer, in screen pixels
    pub hit_tolerance_px: f64,
    /// Rows per page of the inspected attribute table
    pub page_size: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            hit_tolerance_px: 5.0,
            page_size: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Cap on boundary-adjustment passes in natural breaks
    pub natural_breaks_max_iterations: usize,
    /// Minimum improvement of the squared-deviation sum for a boundary move
    pub natural_breaks_epsilon: f64,
    /// Features inspected when checking a field exists before styling
    pub field_sample_size: usize,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            natural_breaks_max_iterations: 1_000,
            natural_breaks_epsilon: 1e-9,
            field_sample_size: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
        assert!(EngineConfig::for_testing().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{"selection": {"page_size": 25}}"#).unwrap();
        assert_eq!(config.selection.page_size, 25);
        assert_eq!(config.selection.hit_tolerance_px, 5.0);
        assert_eq!(config.remote.overpass_max_retries, 3);
    }

    #[test]
    fn test_rejects_bad_proxy() {
        let mut config = EngineConfig::default();
        config.remote.proxy_url = Some("not a url".into());
        assert!(matches!(config.validate(), Err(MapError::Config(_))));
    }

    #[test]
    fn test_rejects_zero_page_size() {
        let mut config = EngineConfig::default();
        config.selection.page_size = 0;
        assert!(config.validate().is_err());
    }
}
