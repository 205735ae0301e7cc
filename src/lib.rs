pub mod assets;
pub mod chain;
pub mod config;
pub mod dag;
pub mod device;
pub mod enhance;
pub mod errors;
pub mod orchestrator;
pub mod phase;
pub mod pipeline_config;
pub mod raster;
pub mod retry;
pub mod tools;
pub mod ui;
