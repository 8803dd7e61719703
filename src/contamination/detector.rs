//! Contamination screening
//!
//! Scores each ASV for contamination suspicion from two signals:
//! a blacklist match against known lab-reagent taxa, and disproportionate
//! low abundance within the sample (consistent with index hopping or
//! cross-sample bleed). The sample-level score is the abundance-weighted
//! mean of per-ASV suspicions; a configurable threshold turns it into a
//! clean/not-clean verdict.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{Asv, PipelineError, Stage, TaxRank, TaxonomicAssignment};

/// Rarity at or above this level is reported as a low-abundance reason on
/// flagged ASVs.
const LOW_ABUNDANCE_REASON_CUTOFF: f64 = 0.9;

/// Contamination detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Known contaminant / lab-reagent taxa. Matched case-insensitively
    /// against every populated rank of an ASV's assignment.
    pub contaminant_taxa: Vec<String>,

    /// Weight of the low-abundance term vs. the taxon-match term, in [0, 1]
    /// (default: 0.4)
    pub abundance_weight: f64,

    /// Per-ASV suspicion at or above this is flagged (default: 0.5)
    pub flag_threshold: f64,

    /// Sample is clean when its score is below this (default: 0.3)
    pub clean_threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            // Common reagent-kit contaminants in amplicon studies, plus
            // host sequence.
            contaminant_taxa: [
                "Ralstonia",
                "Burkholderia",
                "Bradyrhizobium",
                "Sphingomonas",
                "Methylobacterium",
                "Delftia",
                "Cutibacterium",
                "Homo sapiens",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            abundance_weight: 0.4,
            flag_threshold: 0.5,
            clean_threshold: 0.3,
        }
    }
}

/// Why an ASV was considered suspicious.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuspicionReason {
    ContaminantTaxon,
    LowAbundanceOutlier,
}

/// An ASV whose suspicion cleared the flag threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedAsv {
    pub asv_id: String,
    pub suspicion: f64,
    pub reasons: Vec<SuspicionReason>,
}

/// Contamination verdict for one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContaminationReport {
    pub sample_id: String,
    pub contamination_score: f64,
    pub is_clean: bool,
    pub flagged_asvs: Vec<FlaggedAsv>,
}

/// Stateless contamination detection service.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContaminationDetector;

impl ContaminationDetector {
    pub fn new() -> Self {
        Self
    }

    /// Score a sample's ASV set. `assignments` maps asv id → taxonomy;
    /// ASVs without an assignment are scored on abundance alone.
    pub fn detect(
        &self,
        sample_id: &str,
        asvs: &[Asv],
        assignments: Option<&AHashMap<String, TaxonomicAssignment>>,
        config: &DetectorConfig,
    ) -> Result<ContaminationReport, PipelineError> {
        validate_config(config)?;

        if asvs.is_empty() {
            return Ok(ContaminationReport {
                sample_id: sample_id.to_string(),
                contamination_score: 0.0,
                is_clean: true,
                flagged_asvs: Vec::new(),
            });
        }

        let max_reads = asvs.iter().map(|a| a.total_reads).max().unwrap_or(1).max(1);
        let w = config.abundance_weight;

        let mut flagged = Vec::new();
        let mut weighted_sum = 0.0;
        let mut total_reads = 0u64;

        for asv in asvs {
            let assignment = assignments.and_then(|map| map.get(&asv.id));
            let taxon_hit = assignment
                .map(|a| matches_blacklist(a, &config.contaminant_taxa))
                .unwrap_or(false);
            let rarity = 1.0 - asv.total_reads as f64 / max_reads as f64;

            let suspicion = ((1.0 - w) * f64::from(taxon_hit as u8) + w * rarity).clamp(0.0, 1.0);
            weighted_sum += suspicion * asv.total_reads as f64;
            total_reads += asv.total_reads as u64;

            if suspicion >= config.flag_threshold {
                let mut reasons = Vec::new();
                if taxon_hit {
                    reasons.push(SuspicionReason::ContaminantTaxon);
                }
                if rarity >= LOW_ABUNDANCE_REASON_CUTOFF {
                    reasons.push(SuspicionReason::LowAbundanceOutlier);
                }
                flagged.push(FlaggedAsv {
                    asv_id: asv.id.clone(),
                    suspicion,
                    reasons,
                });
            }
        }

        let contamination_score = if total_reads > 0 {
            (weighted_sum / total_reads as f64).clamp(0.0, 1.0)
        } else {
            0.0
        };

        debug!(
            sample = sample_id,
            score = contamination_score,
            flagged = flagged.len(),
            "contamination screening complete"
        );

        Ok(ContaminationReport {
            sample_id: sample_id.to_string(),
            contamination_score,
            is_clean: contamination_score < config.clean_threshold,
            flagged_asvs: flagged,
        })
    }
}

fn validate_config(config: &DetectorConfig) -> Result<(), PipelineError> {
    if !config.abundance_weight.is_finite()
        || !config.flag_threshold.is_finite()
        || !config.clean_threshold.is_finite()
    {
        return Err(PipelineError::computation(
            Stage::Contamination,
            "abundance_weight, flag_threshold and clean_threshold must be finite",
        ));
    }
    if !(0.0..=1.0).contains(&config.abundance_weight) {
        return Err(PipelineError::Validation(format!(
            "abundance_weight must be in [0, 1], got {}",
            config.abundance_weight
        )));
    }
    Ok(())
}

/// Case-insensitive substring match of any populated rank against the
/// blacklist.
fn matches_blacklist(assignment: &TaxonomicAssignment, blacklist: &[String]) -> bool {
    for &rank in TaxRank::all() {
        if let Some(name) = assignment.rank(rank) {
            let name = name.to_lowercase();
            if blacklist
                .iter()
                .any(|entry| name.contains(&entry.to_lowercase()))
            {
                return true;
            }
        }
    }
    false
}
