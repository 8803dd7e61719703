//! Rarefaction: expected richness at subsampled sequencing depths.
//!
//! For each target depth the sample's individual pool is subsampled
//! without replacement (partial Fisher-Yates) and the observed richness
//! recorded; repeated draws give mean and standard deviation per depth.
//! Curves are pure functions of the seed: identical inputs reproduce
//! identical curves, and samples are processed in parallel with rayon.

use ahash::AHashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::SampleAbundance;

/// Rarefaction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RarefactionConfig {
    /// Number of evenly spaced depths up to the sample total (default: 20)
    pub steps: usize,

    /// Subsampling iterations per depth (default: 10)
    pub iterations: usize,

    /// Base RNG seed; combined with the sample id so each sample gets an
    /// independent deterministic stream (default: 42)
    pub seed: u64,
}

impl Default for RarefactionConfig {
    fn default() -> Self {
        Self {
            steps: 20,
            iterations: 10,
            seed: 42,
        }
    }
}

/// One point on a rarefaction curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RarefactionPoint {
    pub sample_size: u64,
    pub mean_richness: f64,
    pub std_richness: f64,
}

/// Rarefaction curve for one sample, ordered by increasing depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RarefactionCurve {
    pub sample_id: String,
    pub points: Vec<RarefactionPoint>,
}

/// Compute rarefaction curves for a set of samples, in sorted sample-id
/// order. Empty samples yield empty curves.
pub fn rarefaction_curves(
    samples: &AHashMap<String, SampleAbundance>,
    config: &RarefactionConfig,
) -> Vec<RarefactionCurve> {
    let mut sample_ids: Vec<&String> = samples.keys().collect();
    sample_ids.sort();

    let curves: Vec<RarefactionCurve> = sample_ids
        .par_iter()
        .map(|sample_id| rarefy_sample(sample_id, &samples[*sample_id], config))
        .collect();

    debug!(samples = curves.len(), "rarefaction complete");
    curves
}

/// Rarefy a single sample across all depths and iterations.
pub fn rarefy_sample(
    sample_id: &str,
    sample: &SampleAbundance,
    config: &RarefactionConfig,
) -> RarefactionCurve {
    // Individual pool: one entry per organism, tagged by taxon index.
    // Taxon order is sorted so the pool layout is deterministic.
    let mut taxa: Vec<(&String, u64)> = sample
        .iter()
        .map(|(name, &count)| (name, count))
        .filter(|&(_, count)| count > 0)
        .collect();
    taxa.sort_by(|a, b| a.0.cmp(b.0));

    let mut pool: Vec<u32> = Vec::new();
    for (index, &(_, count)) in taxa.iter().enumerate() {
        pool.extend(std::iter::repeat(index as u32).take(count as usize));
    }

    let total = pool.len() as u64;
    let taxa_count = taxa.len();
    if total == 0 {
        return RarefactionCurve {
            sample_id: sample_id.to_string(),
            points: Vec::new(),
        };
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed ^ stable_hash(sample_id));
    let mut points = Vec::new();

    for depth in depth_schedule(total, config.steps) {
        let iterations = config.iterations.max(1);
        let mut richness = Vec::with_capacity(iterations);
        for _ in 0..iterations {
            richness.push(subsample_richness(&pool, taxa_count, depth as usize, &mut rng));
        }

        let mean = richness.iter().sum::<f64>() / richness.len() as f64;
        let variance = richness
            .iter()
            .map(|r| (r - mean).powi(2))
            .sum::<f64>()
            / richness.len() as f64;

        points.push(RarefactionPoint {
            sample_size: depth,
            mean_richness: mean,
            std_richness: variance.sqrt(),
        });
    }

    RarefactionCurve {
        sample_id: sample_id.to_string(),
        points,
    }
}

/// Evenly spaced depths from N/steps up to N, deduplicated for small N.
fn depth_schedule(total: u64, steps: usize) -> Vec<u64> {
    let steps = steps.max(1) as u64;
    let mut depths = Vec::new();
    for i in 1..=steps {
        let depth = (total * i) / steps;
        if depth > 0 && depths.last() != Some(&depth) {
            depths.push(depth);
        }
    }
    depths
}

/// Draw `depth` individuals without replacement and count distinct taxa.
/// Partial Fisher-Yates: only the drawn prefix is shuffled.
fn subsample_richness(pool: &[u32], taxa_count: usize, depth: usize, rng: &mut ChaCha8Rng) -> f64 {
    let mut draw: Vec<u32> = pool.to_vec();
    let depth = depth.min(draw.len());

    let mut seen = vec![false; taxa_count];
    let mut richness = 0usize;
    for i in 0..depth {
        let j = rng.gen_range(i..draw.len());
        draw.swap(i, j);
        let taxon = draw[i] as usize;
        if !seen[taxon] {
            seen[taxon] = true;
            richness += 1;
        }
    }
    richness as f64
}

/// Stable FNV-1a hash of the sample id, independent of platform and
/// process (std's `Hash` is intentionally randomized via ahash elsewhere).
fn stable_hash(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in s.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(entries: &[(&str, u64)]) -> SampleAbundance {
        entries
            .iter()
            .map(|(name, count)| (name.to_string(), *count))
            .collect()
    }

    #[test]
    fn test_depth_schedule() {
        assert_eq!(depth_schedule(100, 4), vec![25, 50, 75, 100]);
        // Small totals deduplicate and never include zero.
        assert_eq!(depth_schedule(3, 20), vec![1, 2, 3]);
        assert_eq!(depth_schedule(1, 20), vec![1]);
    }

    #[test]
    fn test_curve_is_deterministic_under_fixed_seed() {
        let s = sample(&[("A", 50), ("B", 30), ("C", 20), ("D", 5)]);
        let config = RarefactionConfig::default();
        let first = rarefy_sample("s1", &s, &config);
        let second = rarefy_sample("s1", &s, &config);
        assert_eq!(first, second);

        let other_seed = RarefactionConfig {
            seed: 7,
            ..Default::default()
        };
        let third = rarefy_sample("s1", &s, &other_seed);
        assert_eq!(first.points.len(), third.points.len());
    }

    #[test]
    fn test_depths_increase_and_saturate_below_observed() {
        let s = sample(&[("A", 40), ("B", 25), ("C", 20), ("D", 10), ("E", 5)]);
        let curve = rarefy_sample("s1", &s, &RarefactionConfig::default());

        for pair in curve.points.windows(2) {
            assert!(pair[1].sample_size > pair[0].sample_size);
        }
        let last = curve.points.last().unwrap();
        assert!(last.mean_richness <= 5.0);
        // Full-depth draw always sees every taxon.
        assert_eq!(last.sample_size, 100);
        assert_eq!(last.mean_richness, 5.0);
        assert_eq!(last.std_richness, 0.0);
    }

    #[test]
    fn test_mean_richness_grows_with_depth() {
        // Strong signal: many rare taxa, so shallow draws miss most of them.
        let entries: Vec<(String, u64)> = (0..50).map(|i| (format!("t{i}"), 4u64)).collect();
        let s: SampleAbundance = entries.into_iter().collect();
        let config = RarefactionConfig {
            iterations: 20,
            ..Default::default()
        };
        let curve = rarefy_sample("s1", &s, &config);
        let first = curve.points.first().unwrap();
        let last = curve.points.last().unwrap();
        assert!(first.mean_richness < last.mean_richness);
    }

    #[test]
    fn test_empty_sample_yields_empty_curve() {
        let curve = rarefy_sample("s1", &sample(&[]), &RarefactionConfig::default());
        assert!(curve.points.is_empty());
    }

    #[test]
    fn test_curves_sorted_by_sample_id() {
        let mut samples: AHashMap<String, SampleAbundance> = AHashMap::new();
        samples.insert("beta".into(), sample(&[("A", 10)]));
        samples.insert("alpha".into(), sample(&[("B", 10)]));
        let curves = rarefaction_curves(&samples, &RarefactionConfig::default());
        assert_eq!(curves[0].sample_id, "alpha");
        assert_eq!(curves[1].sample_id, "beta");
    }
}
