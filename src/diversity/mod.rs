//! Diversity Module
//!
//! Alpha diversity per sample, pairwise beta-diversity matrices, and
//! seeded rarefaction curves.

pub mod alpha;
pub mod beta;
pub mod rarefaction;

pub use alpha::{alpha_diversity, DiversityResult};
pub use beta::{beta_matrix, bray_curtis, jaccard, BetaDiversityMatrix};
pub use rarefaction::{
    rarefaction_curves, rarefy_sample, RarefactionConfig, RarefactionCurve, RarefactionPoint,
};

use ahash::AHashMap;

use crate::core::SampleAbundance;

/// Stateless facade over the diversity computations, mirroring the other
/// stage services. Constructed once, invoked with explicit configs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiversityCalculator;

impl DiversityCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn alpha(&self, sample_id: &str, sample: &SampleAbundance) -> DiversityResult {
        alpha_diversity(sample_id, sample)
    }

    pub fn beta_matrix(&self, samples: &AHashMap<String, SampleAbundance>) -> BetaDiversityMatrix {
        beta_matrix(samples)
    }

    pub fn rarefaction_curves(
        &self,
        samples: &AHashMap<String, SampleAbundance>,
        config: &RarefactionConfig,
    ) -> Vec<RarefactionCurve> {
        rarefaction_curves(samples, config)
    }
}
