pub mod data_structures;
pub mod pipeline_types;

// Re-export key types for stage integration
pub use data_structures::{Asv, Read, SampleAbundance, TaxRank, TaxonomicAssignment};
pub use pipeline_types::{
    ClusteringSummary, PipelineError, PipelineReport, Stage, TaxonCount,
};
