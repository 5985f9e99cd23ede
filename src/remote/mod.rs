//! Remote Source Client
//!
//! Every network call the engine makes goes through [`RemoteSource`], so the
//! registry, the session and the reconstruction executor can be driven by an
//! in-process fake in tests.

pub mod http;
pub mod overpass;
pub mod proxy;
pub mod retry;
pub mod wfs;

use crate::{data::feature::FeatureCollection, Result};
use async_trait::async_trait;

pub use overpass::{OsmCategory, OverpassQuery};
pub use retry::RetryPolicy;
pub use wfs::WfsRequest;

#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// WFS GetFeature; features come back in the map projection.
    async fn fetch_wfs(&self, request: &WfsRequest) -> Result<FeatureCollection>;

    /// Overpass query; an empty collection is a valid answer.
    async fn fetch_overpass(&self, query: &OverpassQuery) -> Result<FeatureCollection>;
}
