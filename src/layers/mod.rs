pub mod base;
pub mod registry;

pub use base::{Layer, LayerId, LayerKind, LayerStyle, LoadState, Provenance};
pub use registry::{LayerRegistry, LoadTicket};
