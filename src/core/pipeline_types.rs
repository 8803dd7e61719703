//! Pipeline Data Types
//!
//! Shared types that cross stage boundaries: the stage state machine, the
//! error taxonomy, and the aggregated end-of-run report. Stage-local outcome
//! structs live next to their stage (`qc`, `cluster`, `taxonomy`, ...).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::cluster::ClusterStats;
use crate::contamination::ContaminationReport;
use crate::diversity::DiversityResult;
use crate::qc::FilterMetrics;
use crate::taxonomy::TaxonomicSummary;

/// Pipeline stages in dependency order. `Diversity` and `Contamination`
/// both follow `Assigning` and may run concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Filtering,
    Clustering,
    Assigning,
    Diversity,
    Contamination,
    Aggregated,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Filtering => "filtering",
            Stage::Clustering => "clustering",
            Stage::Assigning => "assigning",
            Stage::Diversity => "diversity",
            Stage::Contamination => "contamination",
            Stage::Aggregated => "aggregated",
        };
        f.write_str(name)
    }
}

/// Error taxonomy for stage boundaries.
///
/// Per-item failures (one malformed read, one timed-out reference lookup)
/// never surface here; they are absorbed into stage metrics. These variants
/// cover batch-level structural problems and stage-fatal conditions only.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed batch input, rejected before any stage runs.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A stage-internal invariant was violated; fatal to that stage.
    #[error("{stage} stage failed: {message}")]
    Computation { stage: Stage, message: String },

    /// The overall pipeline deadline expired while this stage was running.
    #[error("{stage} stage exceeded the pipeline deadline")]
    StageTimeout { stage: Stage },
}

impl PipelineError {
    pub fn computation(stage: Stage, message: impl Into<String>) -> Self {
        Self::Computation {
            stage,
            message: message.into(),
        }
    }
}

/// A taxon (or ASV) name with its read count, for top-N rankings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonCount {
    pub name: String,
    pub count: u64,
}

/// Clustering stage summary carried into the final report (the ASV list
/// itself is returned separately and can be capped by callers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringSummary {
    pub total_asvs: usize,
    pub total_sequences: usize,
    pub singletons: usize,
    pub stats: ClusterStats,
}

/// Aggregated end-of-run report. Every field a completed stage produced is
/// present even when a later stage failed; `failed_stage`/`failure` say
/// where and why the run stopped short of `Aggregated`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub sample_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub elapsed: Duration,

    pub quality: Option<FilterMetrics>,
    pub clustering: Option<ClusteringSummary>,
    pub taxonomy: Option<TaxonomicSummary>,
    pub diversity: Option<DiversityResult>,
    pub contamination: Option<ContaminationReport>,

    /// Top-N ASV abundance ranking: total reads descending, ties by name.
    pub top_taxa: Vec<TaxonCount>,
    /// Top 10 species-or-finest-rank labels by read count.
    pub top_species: Vec<TaxonCount>,

    pub failed_stage: Option<Stage>,
    pub failure: Option<String>,
}

impl PipelineReport {
    pub fn completed(&self) -> bool {
        self.failed_stage.is_none()
    }
}
