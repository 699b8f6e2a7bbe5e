//! Core engine: the gas guard → dry run → submit → record pipeline.

pub mod guard;
pub mod simulator;
pub mod submitter;
pub mod recorder;
pub mod pipeline;
pub mod preflight;

pub use pipeline::{Pipeline, PipelineSettings};
pub use preflight::{preflight, EngineInfo};
