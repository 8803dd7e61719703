//! Taxonomic Assignment Module
//!
//! Reference matching behind an async `ReferenceSource` seam, plus the
//! batched assigner with bounded lookup concurrency and per-lookup timeouts.

pub mod assigner;
pub mod reference;

pub use assigner::{AssignerConfig, AssignmentOutcome, TaxonomicAssigner, TaxonomicSummary};
pub use reference::{InMemoryReference, Lineage, ReferenceHit, ReferenceSource};
