//! Prelude module for common geocompose types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use geocompose::prelude::*;`

pub use crate::core::{
    bounds::Bounds,
    config::{ClassificationConfig, EngineConfig, RemoteConfig, SelectionConfig},
    engine::{HeadlessEngine, Hit, MapEngine},
    geo::{LatLng, Point, TileCoord},
    session::{MapSession, PendingLoad},
    view::MapView,
};

pub use crate::data::feature::{Attributes, Feature, FeatureCollection, FeatureId, GeometryKind};

pub use crate::layers::{
    base::{Layer, LayerId, LayerKind, LoadState, Provenance},
    registry::{LayerRegistry, LoadTicket},
};

pub use crate::selection::{
    controller::{SelectionController, SelectionTool},
    inspect::InspectedData,
};

pub use crate::classify::{ClassificationMethod, Color, ColorRamp, Symbology, SymbologyRequest};

pub use crate::analysis::{BasicStats, SpatialStatistics, WeightedSum};

pub use crate::remote::{http::HttpRemoteSource, OsmCategory, RemoteSource};

pub use crate::state::{
    codec::{decode, encode},
    document::MapStateDocument,
    reconstruct::{LayerStatus, ReconstructionReport, Reconstructor},
    store::{DocumentStore, FileDocumentStore, InMemoryDocumentStore},
};

pub use crate::notify::{Notice, NoticeLevel};

pub use crate::{MapError, Result};

// Re-export commonly used external types
pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
