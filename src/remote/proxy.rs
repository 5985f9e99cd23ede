//! Same-origin proxy routing.
//!
//! The proxy receives the full upstream URL in its `url` query parameter.

use crate::{MapError, Result};
use reqwest::Url;

/// Routes `upstream` through `proxy` when one is configured.
pub fn proxied(upstream: &Url, proxy: Option<&str>) -> Result<Url> {
    let Some(proxy) = proxy else {
        return Ok(upstream.clone());
    };
    let mut url = Url::parse(proxy)
        .map_err(|e| MapError::Config(format!("invalid proxy url {}: {}", proxy, e)))?;
    url.query_pairs_mut().append_pair("url", upstream.as_str());
    Ok(url)
}

/// Parses a user-supplied service URL.
pub fn parse_service_url(raw: &str) -> Result<Url> {
    Url::parse(raw.trim()).map_err(|e| MapError::InvalidLayer(format!("invalid service url {}: {}", raw, e)))
}
