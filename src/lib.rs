//! # edna-forge: eDNA Metabarcoding Analysis Pipeline
//!
//! Core analysis pipeline for environmental-DNA metabarcoding: raw reads
//! are quality-filtered, clustered into Amplicon Sequence Variants (ASVs),
//! assigned taxonomy against a reference source, summarized into diversity
//! statistics, and screened for likely contaminants.
//!
//! Transport, persistence, and export layers are out of scope; every stage
//! is a stateless service over validated input arrays.

pub mod cluster;
pub mod contamination;
pub mod core;
pub mod diversity;
pub mod pipeline;
pub mod qc;
pub mod reporting;
pub mod taxonomy;

// Re-export commonly used types at crate level
pub use crate::core::data_structures::{Asv, Read, SampleAbundance, TaxRank, TaxonomicAssignment};
pub use crate::core::pipeline_types::{PipelineError, PipelineReport, Stage};
pub use crate::pipeline::{PipelineOptions, PipelineOrchestrator};

/// Result type used throughout the crate
pub type Result<T> = anyhow::Result<T>;

/// Error type used throughout the crate
pub type Error = anyhow::Error;
