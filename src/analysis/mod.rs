//! Spatial Statistics Engine

pub mod kernel;
pub mod stats;

pub use kernel::{GeoKernel, GeometryKernel};
pub use stats::{BasicStats, SpatialStatistics, WeightedSum};
