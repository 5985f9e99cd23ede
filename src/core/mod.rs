pub mod bounds;
pub mod config;
pub mod constants;
pub mod engine;
pub mod geo;
pub mod session;
pub mod view;
