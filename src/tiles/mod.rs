pub mod source;

// Re-exports for convenience
pub use source::{TileSource, TileSpec, WmsTileSource, XyzTileSource};
