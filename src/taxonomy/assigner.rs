//! Taxonomic assignment
//!
//! Matches each ASV against a `ReferenceSource` and derives a ranked
//! assignment. Lookups may suspend on external I/O, so they run with
//! bounded concurrency (semaphore fan-out) and an independent per-lookup
//! timeout; a failed or timed-out lookup degrades that single ASV to
//! "unassigned" without touching its siblings.
//!
//! Confidence = identity × coverage. Ranks populate from kingdom upward
//! while confidence clears each rank's threshold, so a weak hit still
//! yields a coarse assignment instead of nothing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::core::{Asv, TaxRank, TaxonomicAssignment};
use crate::taxonomy::reference::{ReferenceHit, ReferenceSource};

/// Assignment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignerConfig {
    /// Confidence required to keep a species-level name (default: 0.97).
    /// Coarser ranks use the fixed descending ladder below.
    pub confidence_threshold: f64,

    /// Independent timeout per reference lookup (default: 5s)
    pub lookup_timeout: Duration,

    /// Bounded fan-out for concurrent lookups (default: 8)
    pub max_concurrent_lookups: usize,
}

impl Default for AssignerConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.97,
            lookup_timeout: Duration::from_secs(5),
            max_concurrent_lookups: 8,
        }
    }
}

/// Minimum confidence to populate each rank. Species comes from the
/// config; everything coarser uses this fixed ladder.
fn rank_threshold(rank: TaxRank, species_threshold: f64) -> f64 {
    match rank {
        TaxRank::Kingdom => 0.70,
        TaxRank::Phylum => 0.75,
        TaxRank::Class => 0.80,
        TaxRank::Order => 0.85,
        TaxRank::Family => 0.90,
        TaxRank::Genus => 0.95,
        TaxRank::Species => species_threshold,
    }
}

/// Per-rank taxon counts plus batch-level assignment statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaxonomicSummary {
    pub assigned_count: usize,
    pub unassigned_count: usize,
    /// Mean confidence over assigned ASVs (0 when none assigned).
    pub average_confidence: f64,
    /// rank label → taxon name → ASV count.
    pub per_rank: BTreeMap<String, BTreeMap<String, u64>>,
}

/// Result of assigning one ASV batch. `assignments` is in input order,
/// one entry per ASV (unassigned entries included).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentOutcome {
    pub assignments: Vec<TaxonomicAssignment>,
    pub summary: TaxonomicSummary,
    /// Lookups that failed or timed out and were degraded to unassigned.
    pub degraded_lookups: usize,
}

/// Taxonomic assignment service. Holds the reference collaborator;
/// configuration is passed per batch.
pub struct TaxonomicAssigner {
    source: Arc<dyn ReferenceSource>,
}

impl TaxonomicAssigner {
    pub fn new(source: Arc<dyn ReferenceSource>) -> Self {
        Self { source }
    }

    /// Assign taxonomy to a batch of ASVs.
    pub async fn assign(&self, asvs: &[Asv], config: &AssignerConfig) -> AssignmentOutcome {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_lookups.max(1)));
        let mut join_set = JoinSet::new();

        for (index, asv) in asvs.iter().enumerate() {
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            let sequence = asv.representative_sequence.clone();
            let asv_id = asv.id.clone();
            let timeout = config.lookup_timeout;

            join_set.spawn(async move {
                // Closed only when the JoinSet is dropped, which aborts us.
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return (index, asv_id, Lookup::Failed),
                };
                match tokio::time::timeout(timeout, source.best_hit(&sequence)).await {
                    Ok(Ok(hit)) => (index, asv_id, Lookup::Done(hit)),
                    Ok(Err(err)) => {
                        warn!(asv = %asv_id, error = %err, "reference lookup failed");
                        (index, asv_id, Lookup::Failed)
                    }
                    Err(_) => {
                        warn!(asv = %asv_id, "reference lookup timed out");
                        (index, asv_id, Lookup::Failed)
                    }
                }
            });
        }

        let mut assignments: Vec<Option<TaxonomicAssignment>> = vec![None; asvs.len()];
        let mut degraded_lookups = 0usize;

        while let Some(joined) = join_set.join_next().await {
            let (index, asv_id, lookup) = match joined {
                Ok(result) => result,
                Err(err) => {
                    warn!(error = %err, "lookup task panicked");
                    continue;
                }
            };
            let assignment = match lookup {
                Lookup::Done(Some(hit)) => build_assignment(&asv_id, &hit, config),
                Lookup::Done(None) => TaxonomicAssignment::unassigned(&asv_id),
                Lookup::Failed => {
                    degraded_lookups += 1;
                    TaxonomicAssignment::unassigned(&asv_id)
                }
            };
            assignments[index] = Some(assignment);
        }

        let assignments: Vec<TaxonomicAssignment> = assignments
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.unwrap_or_else(|| TaxonomicAssignment::unassigned(&asvs[i].id))
            })
            .collect();

        let summary = summarize(&assignments);
        debug!(
            assigned = summary.assigned_count,
            unassigned = summary.unassigned_count,
            degraded = degraded_lookups,
            "taxonomic assignment complete"
        );

        AssignmentOutcome {
            assignments,
            summary,
            degraded_lookups,
        }
    }
}

enum Lookup {
    Done(Option<ReferenceHit>),
    Failed,
}

/// Walk the rank ladder from kingdom upward, keeping names while the hit's
/// confidence clears each threshold. A hit below the kingdom threshold
/// yields an unassigned entry.
fn build_assignment(asv_id: &str, hit: &ReferenceHit, config: &AssignerConfig) -> TaxonomicAssignment {
    let confidence = (hit.identity * hit.coverage).clamp(0.0, 1.0);
    let mut assignment = TaxonomicAssignment::unassigned(asv_id);

    for &rank in TaxRank::all() {
        if confidence < rank_threshold(rank, config.confidence_threshold) {
            break;
        }
        match hit.lineage.name_at(rank) {
            Some(name) => assignment.set_rank(rank, name.to_string()),
            None => break,
        }
    }

    if assignment.is_unassigned() {
        return assignment;
    }
    assignment.confidence = confidence;
    assignment.reference_match_id = Some(hit.match_id.clone());
    assignment
}

fn summarize(assignments: &[TaxonomicAssignment]) -> TaxonomicSummary {
    let mut summary = TaxonomicSummary::default();
    let mut confidence_sum = 0.0;

    for assignment in assignments {
        if assignment.is_unassigned() {
            summary.unassigned_count += 1;
            continue;
        }
        summary.assigned_count += 1;
        confidence_sum += assignment.confidence;

        for &rank in TaxRank::all() {
            if let Some(name) = assignment.rank(rank) {
                *summary
                    .per_rank
                    .entry(rank.label().to_string())
                    .or_default()
                    .entry(name.to_string())
                    .or_insert(0) += 1;
            }
        }
    }

    if summary.assigned_count > 0 {
        summary.average_confidence = confidence_sum / summary.assigned_count as f64;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::reference::Lineage;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    struct FixedSource {
        hit: Option<ReferenceHit>,
    }

    #[async_trait]
    impl ReferenceSource for FixedSource {
        async fn best_hit(&self, _sequence: &str) -> Result<Option<ReferenceHit>> {
            Ok(self.hit.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl ReferenceSource for FailingSource {
        async fn best_hit(&self, _sequence: &str) -> Result<Option<ReferenceHit>> {
            Err(anyhow!("reference service unavailable"))
        }
    }

    struct SlowSource;

    #[async_trait]
    impl ReferenceSource for SlowSource {
        async fn best_hit(&self, _sequence: &str) -> Result<Option<ReferenceHit>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }
    }

    fn asv(id: &str, seq: &str) -> Asv {
        Asv {
            id: id.to_string(),
            representative_sequence: seq.to_string(),
            member_read_ids: vec![format!("{id}_r1")],
            total_reads: 1,
            abundance_rank: 1,
        }
    }

    fn hit(identity: f64, coverage: f64) -> ReferenceHit {
        ReferenceHit {
            match_id: "ref_1".to_string(),
            lineage: Lineage::from_taxonomy_string(
                "Bacteria;Proteobacteria;Gammaproteobacteria;Enterobacterales;\
                 Enterobacteriaceae;Escherichia;Escherichia coli",
            ),
            identity,
            coverage,
        }
    }

    #[tokio::test]
    async fn test_high_confidence_fills_all_ranks() {
        let assigner = TaxonomicAssigner::new(Arc::new(FixedSource {
            hit: Some(hit(0.99, 1.0)),
        }));
        let outcome = assigner
            .assign(&[asv("asv_1", "ACGT")], &AssignerConfig::default())
            .await;

        let assignment = &outcome.assignments[0];
        assert_eq!(assignment.species.as_deref(), Some("Escherichia coli"));
        assert_eq!(assignment.kingdom.as_deref(), Some("Bacteria"));
        assert_eq!(outcome.summary.assigned_count, 1);
        assert!((outcome.summary.average_confidence - 0.99).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_low_confidence_keeps_coarse_ranks_only() {
        // confidence 0.78: clears kingdom (0.70) and phylum (0.75), not class (0.80)
        let assigner = TaxonomicAssigner::new(Arc::new(FixedSource {
            hit: Some(hit(0.78, 1.0)),
        }));
        let outcome = assigner
            .assign(&[asv("asv_1", "ACGT")], &AssignerConfig::default())
            .await;

        let assignment = &outcome.assignments[0];
        assert_eq!(assignment.kingdom.as_deref(), Some("Bacteria"));
        assert_eq!(assignment.phylum.as_deref(), Some("Proteobacteria"));
        assert_eq!(assignment.class, None);
        assert_eq!(assignment.species, None);
    }

    #[tokio::test]
    async fn test_below_kingdom_threshold_is_unassigned() {
        let assigner = TaxonomicAssigner::new(Arc::new(FixedSource {
            hit: Some(hit(0.5, 1.0)),
        }));
        let outcome = assigner
            .assign(&[asv("asv_1", "ACGT")], &AssignerConfig::default())
            .await;
        assert!(outcome.assignments[0].is_unassigned());
        assert_eq!(outcome.summary.unassigned_count, 1);
        assert_eq!(outcome.degraded_lookups, 0);
    }

    #[tokio::test]
    async fn test_lookup_failure_degrades_single_asv() {
        let assigner = TaxonomicAssigner::new(Arc::new(FailingSource));
        let outcome = assigner
            .assign(
                &[asv("asv_1", "ACGT"), asv("asv_2", "TTTT")],
                &AssignerConfig::default(),
            )
            .await;
        assert_eq!(outcome.assignments.len(), 2);
        assert!(outcome.assignments.iter().all(|a| a.is_unassigned()));
        assert_eq!(outcome.degraded_lookups, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_timeout_degrades_without_cancelling_batch() {
        let assigner = TaxonomicAssigner::new(Arc::new(SlowSource));
        let config = AssignerConfig {
            lookup_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let outcome = assigner
            .assign(&[asv("asv_1", "ACGT"), asv("asv_2", "GGGG")], &config)
            .await;
        assert_eq!(outcome.assignments.len(), 2);
        assert_eq!(outcome.degraded_lookups, 2);
        assert!(outcome.assignments.iter().all(|a| a.is_unassigned()));
    }

    #[tokio::test]
    async fn test_assignments_preserve_input_order() {
        let assigner = TaxonomicAssigner::new(Arc::new(FixedSource {
            hit: Some(hit(0.99, 1.0)),
        }));
        let batch: Vec<Asv> = (0..20)
            .map(|i| asv(&format!("asv_{i}"), "ACGT"))
            .collect();
        let outcome = assigner.assign(&batch, &AssignerConfig::default()).await;
        for (i, assignment) in outcome.assignments.iter().enumerate() {
            assert_eq!(assignment.asv_id, format!("asv_{i}"));
        }
    }

    #[tokio::test]
    async fn test_summary_per_rank_counts() {
        let assigner = TaxonomicAssigner::new(Arc::new(FixedSource {
            hit: Some(hit(0.99, 1.0)),
        }));
        let outcome = assigner
            .assign(
                &[asv("asv_1", "ACGT"), asv("asv_2", "TTTT")],
                &AssignerConfig::default(),
            )
            .await;
        let kingdom = outcome.summary.per_rank.get("kingdom").unwrap();
        assert_eq!(kingdom.get("Bacteria"), Some(&2));
        let species = outcome.summary.per_rank.get("species").unwrap();
        assert_eq!(species.get("Escherichia coli"), Some(&2));
    }
}
