//! # geocompose
//!
//! Layer lifecycle and spatial analysis engine for composed web maps.
//!
//! The crate keeps paired visual/interactive representations of remote
//! datasets in sync, owns a single cross-layer feature selection, computes
//! classification breaks and polygon-weighted statistics, and serializes the
//! whole composition into a portable document that a read-only viewer can
//! rebuild. Rendering, projection kernels and hit-testing belong to the
//! mapping engine behind [`core::engine::MapEngine`].

pub mod analysis;
pub mod classify;
pub mod core;
pub mod data;
pub mod layers;
pub mod notify;
pub mod prelude;
pub mod remote;
pub mod selection;
pub mod spatial;
pub mod state;
pub mod tiles;
pub mod traits;

pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    bounds::Bounds,
    config::EngineConfig,
    engine::{HeadlessEngine, MapEngine},
    geo::{LatLng, Point, TileCoord},
    session::MapSession,
    view::MapView,
};

pub use data::feature::{Attributes, Feature, FeatureCollection, FeatureId};

pub use layers::{
    base::{Layer, LayerId, LayerKind, Provenance},
    registry::LayerRegistry,
};

pub use selection::{controller::SelectionController, inspect::InspectedData};

pub use classify::{
    color::{Color, ColorRamp},
    symbology::{Symbology, SymbologyRequest},
};

pub use analysis::stats::{BasicStats, SpatialStatistics};

pub use remote::{http::HttpRemoteSource, RemoteSource};

pub use state::{
    codec::{decode, encode},
    document::MapStateDocument,
    reconstruct::{ReconstructionReport, Reconstructor},
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Error taxonomy shared by every component.
///
/// Registry and selection operations either fully succeed or return one of
/// these without mutating state. Only the map state reconstruction isolates
/// failures per layer instead of returning early.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("request to {url} failed{}: {message}", status_suffix(.status))]
    RemoteFetch {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid layer: {0}")]
    InvalidLayer(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Stale operation discarded: {0}")]
    StaleOperation(String),

    #[error("Layer not found: {0}")]
    LayerNotFound(LayerId),

    #[error("Spatial index unavailable: {0}")]
    SpatialIndexUnavailable(String),

    #[error("Geometry kernel unavailable: {0}")]
    GeometryKernelUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MapError {
    /// Builds a fetch error from an upstream response.
    pub fn remote(url: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::RemoteFetch {
            url: url.into(),
            status,
            message: message.into(),
        }
    }

    /// Stale results are logged and dropped, never surfaced as failures.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, MapError::StaleOperation(_))
    }

    /// Short message suitable for a toast or an inline hint, naming `subject`
    /// (usually the layer or source the operation targeted).
    pub fn user_message(&self, subject: &str) -> String {
        match self {
            MapError::RemoteFetch { status: Some(status), .. } => {
                format!("Could not load \"{}\": the server answered {}", subject, status)
            }
            MapError::RemoteFetch { .. } => {
                format!("Could not reach the server for \"{}\"", subject)
            }
            MapError::Parse(detail) => format!("\"{}\" could not be read: {}", subject, detail),
            MapError::InvalidLayer(detail) => format!("\"{}\": {}", subject, detail),
            MapError::InsufficientData(detail) => {
                format!("Not enough data in \"{}\" to compute this: {}", subject, detail)
            }
            MapError::LayerNotFound(_) => format!("\"{}\" is no longer on the map", subject),
            other => format!("\"{}\": {}", subject, other),
        }
    }
}

impl From<reqwest::Error> for MapError {
    fn from(error: reqwest::Error) -> Self {
        MapError::RemoteFetch {
            url: error.url().map(|u| u.to_string()).unwrap_or_default(),
            status: error.status().map(|s| s.as_u16()),
            message: error.to_string(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" with HTTP {}", s)).unwrap_or_default()
}

/// Error type alias for convenience
pub type Error = MapError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_errors_are_not_user_visible() {
        assert!(!MapError::StaleOperation("layer removed".into()).is_user_visible());
        assert!(MapError::Parse("bad".into()).is_user_visible());
    }

    #[test]
    fn test_remote_error_message_names_status() {
        let err = MapError::remote("https://example.org/wfs", Some(503), "overloaded");
        assert_eq!(
            err.to_string(),
            "request to https://example.org/wfs failed with HTTP 503: overloaded"
        );
        assert!(err.user_message("Rivers").contains("503"));
    }
}
