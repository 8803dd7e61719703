//! ASV clustering
//!
//! Groups quality-filtered reads into Amplicon Sequence Variants:
//! - Exact mode (threshold = 1.0): hash-based grouping of identical
//!   sequences, O(n).
//! - Similarity mode (threshold < 1.0): dereplicate first, then greedy
//!   nearest-neighbor clustering seeded in descending-abundance order.
//!
//! Output ordering is fully deterministic (reads descending, ties broken
//! lexicographically by representative sequence) so downstream reports are
//! reproducible run to run.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::core::{Asv, PipelineError, Read, Stage};

/// Clustering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClustererConfig {
    /// Identity fraction for cluster membership (default: 1.0 = exact match)
    pub similarity_threshold: f64,

    /// Clusters below this size are retained but reported; size 1 marks a
    /// singleton (default: 1, keep everything)
    pub min_cluster_size: usize,
}

impl Default for ClustererConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 1.0,
            min_cluster_size: 1,
        }
    }
}

/// Cluster-size statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterStats {
    /// Cluster size → number of clusters of that size.
    pub size_distribution: BTreeMap<usize, usize>,
    pub mean_cluster_size: f64,
    /// Clusters smaller than `min_cluster_size` (retained, not dropped).
    pub below_min_size: usize,
}

/// Result of one clustering pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterOutcome {
    pub asvs: Vec<Asv>,
    pub total_asvs: usize,
    pub total_sequences: usize,
    pub singletons: usize,
    pub stats: ClusterStats,
}

/// One dereplicated unique sequence with its member reads.
struct UniqueSequence {
    sequence: String,
    member_read_ids: Vec<String>,
}

/// Stateless ASV clustering service.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsvClusterer;

impl AsvClusterer {
    pub fn new() -> Self {
        Self
    }

    /// Cluster a batch of passed reads into ASVs.
    pub fn cluster(
        &self,
        reads: &[Read],
        config: &ClustererConfig,
    ) -> Result<ClusterOutcome, PipelineError> {
        if !config.similarity_threshold.is_finite() {
            return Err(PipelineError::computation(
                Stage::Clustering,
                "similarity_threshold is not a finite number",
            ));
        }
        if !(config.similarity_threshold > 0.0 && config.similarity_threshold <= 1.0) {
            return Err(PipelineError::Validation(format!(
                "similarity_threshold must be in (0, 1], got {}",
                config.similarity_threshold
            )));
        }

        let uniques = dereplicate(reads);

        let clusters = if config.similarity_threshold >= 1.0 {
            // Exact mode: every unique sequence is its own cluster.
            uniques
        } else {
            greedy_cluster(uniques, config.similarity_threshold)
        };

        Ok(self.finalize(clusters, reads.len(), config))
    }

    /// Sort clusters deterministically, assign ids and ranks, compute stats.
    fn finalize(
        &self,
        mut clusters: Vec<UniqueSequence>,
        total_sequences: usize,
        config: &ClustererConfig,
    ) -> ClusterOutcome {
        clusters.sort_by(|a, b| {
            b.member_read_ids
                .len()
                .cmp(&a.member_read_ids.len())
                .then_with(|| a.sequence.cmp(&b.sequence))
        });

        let mut stats = ClusterStats::default();
        let mut singletons = 0usize;

        let asvs: Vec<Asv> = clusters
            .into_iter()
            .enumerate()
            .map(|(i, cluster)| {
                let size = cluster.member_read_ids.len();
                *stats.size_distribution.entry(size).or_insert(0) += 1;
                if size == 1 {
                    singletons += 1;
                }
                if size < config.min_cluster_size {
                    stats.below_min_size += 1;
                }
                Asv {
                    id: format!("asv_{}", i + 1),
                    representative_sequence: cluster.sequence,
                    member_read_ids: cluster.member_read_ids,
                    total_reads: size,
                    abundance_rank: i + 1,
                }
            })
            .collect();

        if !asvs.is_empty() {
            stats.mean_cluster_size = total_sequences as f64 / asvs.len() as f64;
        }

        debug!(
            asvs = asvs.len(),
            sequences = total_sequences,
            singletons,
            "clustering complete"
        );

        ClusterOutcome {
            total_asvs: asvs.len(),
            total_sequences,
            singletons,
            stats,
            asvs,
        }
    }
}

/// Collapse identical sequences (case-insensitive), preserving member ids
/// in input order.
fn dereplicate(reads: &[Read]) -> Vec<UniqueSequence> {
    let mut map: AHashMap<String, Vec<String>> = AHashMap::new();
    let mut order: Vec<String> = Vec::new();

    for read in reads {
        let key = read.sequence.to_uppercase();
        match map.get_mut(&key) {
            Some(members) => members.push(read.id.clone()),
            None => {
                order.push(key.clone());
                map.insert(key, vec![read.id.clone()]);
            }
        }
    }

    order
        .into_iter()
        .map(|sequence| {
            let member_read_ids = map.remove(&sequence).unwrap_or_default();
            UniqueSequence {
                sequence,
                member_read_ids,
            }
        })
        .collect()
}

/// Greedy nearest-neighbor clustering over dereplicated sequences.
///
/// Uniques are visited in descending-abundance order (ties lexicographic);
/// the most abundant unclustered sequence seeds a cluster and every later
/// unclustered sequence whose identity to the seed meets the threshold
/// joins it. Scanning seeds in abundance order means an identity tie always
/// lands in the earlier (more abundant) seed's cluster. The seed sequence
/// becomes the cluster representative.
fn greedy_cluster(mut uniques: Vec<UniqueSequence>, threshold: f64) -> Vec<UniqueSequence> {
    uniques.sort_by(|a, b| {
        b.member_read_ids
            .len()
            .cmp(&a.member_read_ids.len())
            .then_with(|| a.sequence.cmp(&b.sequence))
    });

    let n = uniques.len();
    let mut clustered = vec![false; n];
    let mut clusters: Vec<UniqueSequence> = Vec::new();

    for seed_idx in 0..n {
        if clustered[seed_idx] {
            continue;
        }
        clustered[seed_idx] = true;

        let mut cluster = UniqueSequence {
            sequence: uniques[seed_idx].sequence.clone(),
            member_read_ids: std::mem::take(&mut uniques[seed_idx].member_read_ids),
        };

        for candidate_idx in (seed_idx + 1)..n {
            if clustered[candidate_idx] {
                continue;
            }
            let id = identity(&cluster.sequence, &uniques[candidate_idx].sequence);
            if id >= threshold {
                clustered[candidate_idx] = true;
                cluster
                    .member_read_ids
                    .append(&mut uniques[candidate_idx].member_read_ids);
            }
        }

        clusters.push(cluster);
    }

    clusters
}

/// Positional identity fraction: matching positions / longer length.
/// Length differences count as mismatches.
fn identity(a: &str, b: &str) -> f64 {
    let longer = a.len().max(b.len());
    if longer == 0 {
        return 1.0;
    }
    let matches = a
        .bytes()
        .zip(b.bytes())
        .filter(|(x, y)| x == y)
        .count();
    matches as f64 / longer as f64
}
