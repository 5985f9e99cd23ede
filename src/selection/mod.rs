pub mod controller;
pub mod inspect;

pub use controller::{SelectionChanged, SelectionController, SelectionTicket, SelectionTool};
pub use inspect::{InspectedData, InspectedRow};
