//! Pipeline Orchestration Module
//!
//! Sequences the stage services into one end-to-end run with partial-result
//! aggregation and an overall deadline.

pub mod orchestrator;

pub use orchestrator::{PipelineOptions, PipelineOrchestrator};
