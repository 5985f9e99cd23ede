//! Classification Engine: class breaks, color ramps and symbology building.

pub mod breaks;
pub mod color;
pub mod symbology;

pub use breaks::{class_index, natural_breaks, quantiles, ClassificationMethod};
pub use color::{Color, ColorRamp};
pub use symbology::{build_symbology, Category, Symbology, SymbologyRequest};
