//! Map State Codec: shareable snapshots of a composed map and their
//! reconstruction in a read-only viewer.

pub mod codec;
pub mod document;
pub mod reconstruct;
pub mod store;

pub use codec::{decode, encode, PlannedLayer, ReconstructionPlan, ReconstructionStep};
pub use document::{MapStateDocument, RemoteKind, RemoteLayer, SerializableLayer};
pub use reconstruct::{LayerReport, LayerStatus, ReconstructionReport, Reconstructor};
pub use store::{DocumentId, DocumentStore, FileDocumentStore, InMemoryDocumentStore};
