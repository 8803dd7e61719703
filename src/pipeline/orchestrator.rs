//! Pipeline orchestration
//!
//! Runs the full analysis as a stage state machine:
//! `Filtering → Clustering → Assigning → {Diversity ∥ Contamination} →
//! Aggregated`. Each stage starts only after the previous one returned;
//! diversity and contamination share inputs and run concurrently. A fatal
//! stage error (or the overall deadline expiring mid-stage) stops the run,
//! but the report always carries every completed stage's output.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::cluster::{AsvClusterer, ClusterOutcome, ClustererConfig};
use crate::contamination::{ContaminationDetector, DetectorConfig};
use crate::core::{
    Asv, ClusteringSummary, PipelineError, PipelineReport, Read, SampleAbundance, Stage,
    TaxonCount, TaxonomicAssignment,
};
use crate::diversity::DiversityCalculator;
use crate::qc::{QualityFilter, QualityFilterConfig};
use crate::taxonomy::{AssignerConfig, ReferenceSource, TaxonomicAssigner};

/// Options for one end-to-end run. Every field has a sensible default;
/// callers override only what they need.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineOptions {
    pub quality: QualityFilterConfig,
    pub clustering: ClustererConfig,
    pub assignment: AssignerConfig,
    pub contamination: DetectorConfig,
    /// Size of the top-abundance ranking in the report (default: 10).
    pub top_n: Option<usize>,
    /// Overall deadline for the run; a stage still outstanding when it expires
    /// fails with `StageTimeout` while earlier results are kept.
    pub overall_timeout: Option<Duration>,
}

/// Orchestrates the stage services over one read batch. The services are
/// stateless; the orchestrator owns only the reference collaborator handle.
pub struct PipelineOrchestrator {
    filter: QualityFilter,
    clusterer: AsvClusterer,
    assigner: TaxonomicAssigner,
    diversity: DiversityCalculator,
    detector: ContaminationDetector,
}

impl PipelineOrchestrator {
    pub fn new(source: Arc<dyn ReferenceSource>) -> Self {
        Self {
            filter: QualityFilter::new(),
            clusterer: AsvClusterer::new(),
            assigner: TaxonomicAssigner::new(source),
            diversity: DiversityCalculator::new(),
            detector: ContaminationDetector::new(),
        }
    }

    /// Run the full pipeline for one sample.
    ///
    /// Returns `Err` only for batch-level validation problems detected
    /// before any stage runs; stage failures are reported inside the
    /// returned report (`failed_stage` / `failure`) alongside whatever
    /// stages completed.
    pub async fn run(
        &self,
        reads: &[Read],
        sample_id: &str,
        options: &PipelineOptions,
    ) -> Result<PipelineReport, PipelineError> {
        if reads.is_empty() {
            return Err(PipelineError::Validation(
                "sequences must be a non-empty array".into(),
            ));
        }

        let started = Instant::now();
        let deadline = options
            .overall_timeout
            .map(|t| tokio::time::Instant::now() + t);
        let mut report = empty_report(sample_id);

        info!(sample = sample_id, reads = reads.len(), "🧬 starting pipeline run");

        // Filtering
        if stage_expired(deadline) {
            return Ok(fail(report, Stage::Filtering, timeout_err(Stage::Filtering), started));
        }
        info!("🔍 stage 1: quality filtering");
        let filtered = self.filter.filter(reads, &options.quality);
        report.quality = Some(filtered.metrics.clone());

        // Clustering
        if stage_expired(deadline) {
            return Ok(fail(report, Stage::Clustering, timeout_err(Stage::Clustering), started));
        }
        info!("🧩 stage 2: ASV clustering");
        let clustered = match self.clusterer.cluster(&filtered.passed, &options.clustering) {
            Ok(outcome) => outcome,
            Err(err) => return Ok(fail(report, Stage::Clustering, err, started)),
        };
        report.clustering = Some(summary_of(&clustered));

        // Assigning
        info!("🏷️  stage 3: taxonomic assignment");
        let assignment_future = self.assigner.assign(&clustered.asvs, &options.assignment);
        let assigned = match run_until(deadline, assignment_future).await {
            Some(outcome) => outcome,
            None => return Ok(fail(report, Stage::Assigning, timeout_err(Stage::Assigning), started)),
        };
        report.taxonomy = Some(assigned.summary.clone());

        let assignment_lookup: AHashMap<String, TaxonomicAssignment> = assigned
            .assignments
            .iter()
            .cloned()
            .map(|a| (a.asv_id.clone(), a))
            .collect();
        let abundance = abundance_by_taxon(&clustered.asvs, &assignment_lookup);

        // Diversity ∥ Contamination
        info!("📊 stage 4: diversity and contamination screening");
        let diversity_future = run_until(deadline, async {
            self.diversity.alpha(sample_id, &abundance)
        });
        let contamination_future = run_until(deadline, async {
            self.detector.detect(
                sample_id,
                &clustered.asvs,
                Some(&assignment_lookup),
                &options.contamination,
            )
        });
        let (diversity, contamination) = tokio::join!(diversity_future, contamination_future);

        // Record whichever of the pair completed before reporting a failure,
        // so an expired sibling never drops a finished result.
        if let Some(result) = diversity {
            report.diversity = Some(result);
        }
        match contamination {
            Some(Ok(result)) => report.contamination = Some(result),
            Some(Err(err)) => return Ok(fail(report, Stage::Contamination, err, started)),
            None => {}
        }
        if report.diversity.is_none() {
            return Ok(fail(report, Stage::Diversity, timeout_err(Stage::Diversity), started));
        }
        if report.contamination.is_none() {
            return Ok(fail(
                report,
                Stage::Contamination,
                timeout_err(Stage::Contamination),
                started,
            ));
        }

        // Aggregation
        let top_n = options.top_n.unwrap_or(10);
        report.top_taxa = top_taxa(&clustered.asvs, &assignment_lookup, top_n);
        report.top_species = top_counts(&abundance, 10);
        report.elapsed = started.elapsed();

        info!(
            sample = sample_id,
            asvs = clustered.total_asvs,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "✅ pipeline run aggregated"
        );
        Ok(report)
    }
}

fn empty_report(sample_id: &str) -> PipelineReport {
    PipelineReport {
        sample_id: sample_id.to_string(),
        timestamp: chrono::Utc::now(),
        elapsed: Duration::ZERO,
        quality: None,
        clustering: None,
        taxonomy: None,
        diversity: None,
        contamination: None,
        top_taxa: Vec::new(),
        top_species: Vec::new(),
        failed_stage: None,
        failure: None,
    }
}

fn summary_of(outcome: &ClusterOutcome) -> ClusteringSummary {
    ClusteringSummary {
        total_asvs: outcome.total_asvs,
        total_sequences: outcome.total_sequences,
        singletons: outcome.singletons,
        stats: outcome.stats.clone(),
    }
}

fn timeout_err(stage: Stage) -> PipelineError {
    PipelineError::StageTimeout { stage }
}

fn stage_expired(deadline: Option<tokio::time::Instant>) -> bool {
    deadline.is_some_and(|d| tokio::time::Instant::now() >= d)
}

/// Run a stage future against the overall deadline. `None` means the
/// deadline expired first.
async fn run_until<F: std::future::Future>(
    deadline: Option<tokio::time::Instant>,
    future: F,
) -> Option<F::Output> {
    match deadline {
        Some(d) => tokio::time::timeout_at(d, future).await.ok(),
        None => Some(future.await),
    }
}

fn fail(
    mut report: PipelineReport,
    stage: Stage,
    err: PipelineError,
    started: Instant,
) -> PipelineReport {
    warn!(stage = %stage, error = %err, "pipeline halted; returning completed stages");
    report.failed_stage = Some(stage);
    report.failure = Some(err.to_string());
    report.elapsed = started.elapsed();
    report
}

/// Sample abundance keyed by finest assigned taxon label, falling back to
/// the ASV id for unassigned ASVs.
fn abundance_by_taxon(
    asvs: &[Asv],
    assignments: &AHashMap<String, TaxonomicAssignment>,
) -> SampleAbundance {
    let mut abundance = SampleAbundance::default();
    for asv in asvs {
        let label = assignments
            .get(&asv.id)
            .and_then(|a| a.best_label())
            .unwrap_or(&asv.id)
            .to_string();
        *abundance.entry(label).or_insert(0) += asv.total_reads as u64;
    }
    abundance
}

/// Top-N ASV ranking by total reads descending, ties by display name.
fn top_taxa(
    asvs: &[Asv],
    assignments: &AHashMap<String, TaxonomicAssignment>,
    n: usize,
) -> Vec<TaxonCount> {
    let mut ranked: Vec<TaxonCount> = asvs
        .iter()
        .map(|asv| TaxonCount {
            name: assignments
                .get(&asv.id)
                .and_then(|a| a.best_label())
                .unwrap_or(&asv.id)
                .to_string(),
            count: asv.total_reads as u64,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(n);
    ranked
}

/// Top-N aggregated counts, descending, ties by name.
fn top_counts(abundance: &SampleAbundance, n: usize) -> Vec<TaxonCount> {
    let mut ranked: Vec<TaxonCount> = abundance
        .iter()
        .map(|(name, &count)| TaxonCount {
            name: name.clone(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(n);
    ranked
}
