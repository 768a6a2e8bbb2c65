//! Pairwise-distance-profile (PDP) pipeline for tracked point configurations.
//!
//! Loads `conID, tstID, poiID, x, y` datasets, derives the buffered variant
//! and runs the enabled analysis stages for each PDP variant in turn.

pub mod config;
pub mod context;
pub mod data;
pub mod error;
pub mod pipeline;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::PipelineError;
