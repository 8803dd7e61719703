//! Beta diversity: pairwise community dissimilarity across samples.
//!
//! Bray-Curtis (abundance-weighted) and Jaccard (presence/absence)
//! distances over the union of taxon keys; absent taxa count as zero.
//! Matrices are symmetric with a zero diagonal, rows/columns keyed by
//! sorted sample id for deterministic output.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::core::SampleAbundance;

/// Symmetric pairwise distance matrices for one sample set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetaDiversityMatrix {
    /// Row/column order of both matrices (sorted sample ids).
    pub sample_ids: Vec<String>,
    pub bray_curtis: Vec<Vec<f64>>,
    pub jaccard: Vec<Vec<f64>>,
}

/// Bray-Curtis dissimilarity: Σ|x_i - y_i| / Σ(x_i + y_i) over the key
/// union. Zero when both samples are empty.
pub fn bray_curtis(a: &SampleAbundance, b: &SampleAbundance) -> f64 {
    let mut numerator = 0.0;
    let mut denominator = 0.0;

    for (taxon, &x) in a {
        let y = b.get(taxon).copied().unwrap_or(0);
        numerator += (x as f64 - y as f64).abs();
        denominator += (x + y) as f64;
    }
    // Taxa present only in b.
    for (taxon, &y) in b {
        if !a.contains_key(taxon) {
            numerator += y as f64;
            denominator += y as f64;
        }
    }

    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Jaccard distance: 1 - |A ∩ B| / |A ∪ B| on presence sets (count > 0).
/// Zero when both samples are empty.
pub fn jaccard(a: &SampleAbundance, b: &SampleAbundance) -> f64 {
    let present_a: AHashSet<&str> = a
        .iter()
        .filter(|(_, &c)| c > 0)
        .map(|(k, _)| k.as_str())
        .collect();
    let present_b: AHashSet<&str> = b
        .iter()
        .filter(|(_, &c)| c > 0)
        .map(|(k, _)| k.as_str())
        .collect();

    let union = present_a.union(&present_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = present_a.intersection(&present_b).count();
    1.0 - intersection as f64 / union as f64
}

/// Compute both distance matrices across all sample pairs.
pub fn beta_matrix(samples: &AHashMap<String, SampleAbundance>) -> BetaDiversityMatrix {
    let mut sample_ids: Vec<String> = samples.keys().cloned().collect();
    sample_ids.sort();

    let n = sample_ids.len();
    let mut bray = vec![vec![0.0; n]; n];
    let mut jac = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..i {
            let a = &samples[&sample_ids[i]];
            let b = &samples[&sample_ids[j]];
            let bc = bray_curtis(a, b);
            let jd = jaccard(a, b);
            bray[i][j] = bc;
            bray[j][i] = bc;
            jac[i][j] = jd;
            jac[j][i] = jd;
        }
    }

    BetaDiversityMatrix {
        sample_ids,
        bray_curtis: bray,
        jaccard: jac,
    }
}
