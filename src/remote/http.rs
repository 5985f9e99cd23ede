use crate::{
    core::config::RemoteConfig,
    data::{
        feature::FeatureCollection,
        geojson::{features_from_value, SourceCrs},
        osm::parse_overpass,
    },
    remote::{
        overpass::OverpassQuery, proxy::proxied, retry::RetryPolicy, wfs::WfsRequest, RemoteSource,
    },
    MapError, Result,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{header::USER_AGENT, Client, RequestBuilder, Url};
use serde_json::Value;

/// Shared async HTTP client. A failed build is kept and reported on use.
static HTTP_CLIENT: Lazy<std::result::Result<Client, String>> =
    Lazy::new(|| Client::builder().build().map_err(|e| e.to_string()));

fn http_client() -> Result<&'static Client> {
    (*HTTP_CLIENT)
        .as_ref()
        .map_err(|e| MapError::Config(format!("HTTP client unavailable: {}", e)))
}

/// Upstream bodies quoted in errors are cut to this many characters
const ERROR_BODY_LIMIT: usize = 512;

/// [`RemoteSource`] over HTTP, optionally through the same-origin proxy.
pub struct HttpRemoteSource {
    config: RemoteConfig,
    overpass_retry: RetryPolicy,
}

impl HttpRemoteSource {
    pub fn new(config: RemoteConfig) -> Self {
        let overpass_retry = RetryPolicy::overpass(&config);
        Self {
            config,
            overpass_retry,
        }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn route(&self, upstream: &Url) -> Result<Url> {
        proxied(upstream, self.config.proxy_url.as_deref())
    }

    /// Sends the request and reads a JSON body. Non-2xx answers and bodies that
    /// are not JSON become `RemoteFetch` errors carrying the upstream status and
    /// (truncated) body.
    async fn send_json(&self, upstream: &Url, request: RequestBuilder) -> Result<Value> {
        let response = request
            .header(USER_AGENT, &self.config.user_agent)
            .timeout(self.config.request_timeout())
            .send()
            .await
            .map_err(|e| MapError::remote(upstream.as_str(), None, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MapError::remote(upstream.as_str(), Some(status.as_u16()), e.to_string()))?;

        if !status.is_success() {
            return Err(MapError::remote(
                upstream.as_str(),
                Some(status.as_u16()),
                truncate(&body),
            ));
        }

        serde_json::from_str(&body).map_err(|_| {
            MapError::remote(
                upstream.as_str(),
                Some(status.as_u16()),
                format!("expected JSON, got: {}", truncate(&body)),
            )
        })
    }
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

#[async_trait]
impl RemoteSource for HttpRemoteSource {
    async fn fetch_wfs(&self, request: &WfsRequest) -> Result<FeatureCollection> {
        let upstream = request.to_url()?;
        let url = self.route(&upstream)?;
        log::debug!("WFS GetFeature {}", upstream);

        let body = self.send_json(&upstream, http_client()?.get(url)).await?;
        let crs = if request.in_map_srs() {
            SourceCrs::Map
        } else {
            SourceCrs::LonLat
        };
        let features = features_from_value(body, &request.type_name, crs)?;
        log::info!("loaded {} features of {}", features.len(), request.type_name);
        Ok(features)
    }

    async fn fetch_overpass(&self, query: &OverpassQuery) -> Result<FeatureCollection> {
        let upstream = Url::parse(&self.config.overpass_url)
            .map_err(|e| MapError::Config(format!("invalid overpass_url: {}", e)))?;
        let url = self.route(&upstream)?;
        let ql = query.to_ql();
        let client = http_client()?;
        log::debug!("Overpass query for {}: {}", query.category, ql);

        let body = self
            .overpass_retry
            .run(|| {
                let request = client.post(url.clone()).form(&[("data", ql.as_str())]);
                self.send_json(&upstream, request)
            })
            .await?;
        let features = parse_overpass(body)?;
        log::info!("Overpass returned {} {} features", features.len(), query.category);
        Ok(features)
    }
}
