//! End-to-end pipeline runs against an in-memory reference database.

use std::sync::Arc;

use edna_forge::cluster::{AsvClusterer, ClustererConfig};
use edna_forge::qc::{QualityFilter, QualityFilterConfig};
use edna_forge::reporting::RunReport;
use edna_forge::taxonomy::{InMemoryReference, Lineage};
use edna_forge::{PipelineOptions, PipelineOrchestrator, Read};

const VIBRIO_16S: &str = "ACGTTACCGGAATTCCGATAGGCTTACCAGATTGACCGGTAACTGCAA";
const SHEWANELLA_16S: &str = "TTGACCATGCAAGTCGAGCGGTAACAGGAATTAGCTTGCTAATTCGCT";
const RALSTONIA_16S: &str = "GGCCTAACACATGCAAGTCGAACGGCAGCACGGGCTTCGGCCTGGTGG";

fn reference() -> InMemoryReference {
    InMemoryReference::new(8)
        .with_entry(
            "ref_vibrio",
            VIBRIO_16S,
            Lineage::from_taxonomy_string(
                "Bacteria;Proteobacteria;Gammaproteobacteria;Vibrionales;\
                 Vibrionaceae;Vibrio;Vibrio harveyi",
            ),
        )
        .with_entry(
            "ref_shewanella",
            SHEWANELLA_16S,
            Lineage::from_taxonomy_string(
                "Bacteria;Proteobacteria;Gammaproteobacteria;Alteromonadales;\
                 Shewanellaceae;Shewanella;Shewanella oneidensis",
            ),
        )
        .with_entry(
            "ref_ralstonia",
            RALSTONIA_16S,
            Lineage::from_taxonomy_string(
                "Bacteria;Proteobacteria;Betaproteobacteria;Burkholderiales;\
                 Burkholderiaceae;Ralstonia;Ralstonia pickettii",
            ),
        )
}

fn community_reads() -> Vec<Read> {
    let mut reads = Vec::new();
    let good = |id: String, seq: &str| Read::with_quality(id, seq, vec![36; seq.len()]);

    for i in 0..12 {
        reads.push(good(format!("vib_{i}"), VIBRIO_16S));
    }
    for i in 0..6 {
        reads.push(good(format!("she_{i}"), SHEWANELLA_16S));
    }
    // A trace of a known reagent contaminant.
    reads.push(good("ral_0".to_string(), RALSTONIA_16S));
    // A read that fails the quality gate.
    reads.push(Read::with_quality(
        "junk_0",
        "TTTTTTTTTTTTTTTTTTTTTTTTTTTTTT",
        vec![4; 30],
    ));
    reads
}

#[tokio::test]
async fn full_run_assigns_and_aggregates() {
    let orchestrator = PipelineOrchestrator::new(Arc::new(reference()));
    let report = orchestrator
        .run(&community_reads(), "pond_a", &PipelineOptions::default())
        .await
        .expect("valid batch");

    assert!(report.completed(), "failure: {:?}", report.failure);

    let quality = report.quality.as_ref().unwrap();
    assert_eq!(quality.total_reads, 20);
    assert_eq!(quality.passed_count, 19);
    assert_eq!(quality.failed_by_reason.quality, 1);

    let clustering = report.clustering.as_ref().unwrap();
    assert_eq!(clustering.total_asvs, 3);
    assert_eq!(clustering.singletons, 1);

    let taxonomy = report.taxonomy.as_ref().unwrap();
    assert_eq!(taxonomy.assigned_count, 3);
    assert_eq!(taxonomy.unassigned_count, 0);
    assert!(taxonomy.average_confidence > 0.9);

    let diversity = report.diversity.as_ref().unwrap();
    assert_eq!(diversity.observed_richness, 3);
    assert!(diversity.shannon > 0.0);

    // Most abundant taxon leads the rankings.
    assert_eq!(report.top_taxa[0].name, "Vibrio harveyi");
    assert_eq!(report.top_taxa[0].count, 12);
    assert_eq!(report.top_species[0].name, "Vibrio harveyi");

    // The trace Ralstonia ASV is blacklisted and rare: flagged, but the
    // sample stays clean overall.
    let contamination = report.contamination.as_ref().unwrap();
    assert!(contamination.is_clean);
    assert_eq!(contamination.flagged_asvs.len(), 1);

    // The rendered report reflects the aggregated run.
    let rendered = RunReport::new(&report);
    assert!(rendered.summary.contains("pond_a"));
    assert!(rendered.summary.contains("Vibrio harveyi"));
    assert!(rendered.json.contains("\"passed_count\": 19"));
}

#[tokio::test]
async fn run_without_reference_degrades_to_unassigned() {
    let orchestrator = PipelineOrchestrator::new(Arc::new(InMemoryReference::new(8)));
    let report = orchestrator
        .run(&community_reads(), "pond_b", &PipelineOptions::default())
        .await
        .expect("valid batch");

    assert!(report.completed());
    let taxonomy = report.taxonomy.as_ref().unwrap();
    assert_eq!(taxonomy.assigned_count, 0);
    assert_eq!(taxonomy.unassigned_count, 3);

    // Diversity still works, keyed by ASV ids.
    assert_eq!(report.diversity.as_ref().unwrap().observed_richness, 3);
}

#[tokio::test]
async fn repeated_runs_are_deterministic() {
    let orchestrator = PipelineOrchestrator::new(Arc::new(reference()));
    let options = PipelineOptions::default();
    let reads = community_reads();

    let first = orchestrator.run(&reads, "pond_a", &options).await.unwrap();
    let second = orchestrator.run(&reads, "pond_a", &options).await.unwrap();

    assert_eq!(first.top_taxa, second.top_taxa);
    assert_eq!(first.top_species, second.top_species);
    assert_eq!(first.diversity, second.diversity);
    assert_eq!(
        first.contamination.as_ref().unwrap().contamination_score,
        second.contamination.as_ref().unwrap().contamination_score
    );
}

#[test]
fn filter_then_cluster_partition_holds() {
    // Mixed-quality batch feeding exact clustering.
    let reads = vec![
        Read::with_quality("r1", "ACGT", vec![30; 4]),
        Read::with_quality("r2", "ACGT", vec![30; 4]),
        Read::with_quality("r3", "TTTT", vec![5; 4]),
    ];
    let outcome = QualityFilter::new().filter(&reads, &QualityFilterConfig::default());
    assert_eq!(outcome.metrics.passed_count, 2);
    assert_eq!(outcome.failed[0].id, "r3");

    let clustered = AsvClusterer::new()
        .cluster(&outcome.passed, &ClustererConfig::default())
        .unwrap();
    assert_eq!(clustered.total_asvs, 1);
    assert_eq!(clustered.asvs[0].total_reads, 2);

    let member_total: usize = clustered.asvs.iter().map(|a| a.total_reads).sum();
    assert_eq!(member_total, outcome.passed.len());
}
