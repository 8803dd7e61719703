//! Alpha diversity metrics for ecological community analysis.
//!
//! Shannon entropy, Simpson index, Chao1 richness estimator, observed
//! richness, and Pielou evenness, computed per sample from an abundance
//! map. Pure math over counts; empty samples yield zeros.

use serde::{Deserialize, Serialize};

use crate::core::SampleAbundance;

/// Alpha diversity summary for a single sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiversityResult {
    pub sample_id: String,
    pub shannon: f64,
    pub simpson: f64,
    pub chao1: f64,
    pub observed_richness: usize,
    /// Pielou evenness `H / ln(S_obs)`; undefined for S_obs <= 1.
    pub evenness: Option<f64>,
}

/// Compute all alpha diversity metrics for a sample.
pub fn alpha_diversity(sample_id: &str, sample: &SampleAbundance) -> DiversityResult {
    let counts: Vec<u64> = sample.values().copied().filter(|&c| c > 0).collect();
    let s_obs = counts.len();
    let h = shannon(&counts);

    let evenness = if s_obs > 1 {
        Some(h / (s_obs as f64).ln())
    } else {
        None
    };

    DiversityResult {
        sample_id: sample_id.to_string(),
        shannon: h,
        simpson: simpson(&counts),
        chao1: chao1(&counts),
        observed_richness: s_obs,
        evenness,
    }
}

/// Shannon entropy: H = -Σ p_i * ln(p_i), natural log.
pub fn shannon(counts: &[u64]) -> f64 {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }

    let mut h = 0.0;
    for &c in counts {
        if c > 0 {
            let p = c as f64 / total as f64;
            h -= p * p.ln();
        }
    }
    h
}

/// Simpson's diversity index: 1 - Σ p_i². Range [0, 1].
pub fn simpson(counts: &[u64]) -> f64 {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }

    let mut sum_p2 = 0.0;
    for &c in counts {
        if c > 0 {
            let p = c as f64 / total as f64;
            sum_p2 += p * p;
        }
    }
    1.0 - sum_p2
}

/// Chao1 richness estimator: S_obs + F1²/(2·F2), falling back to the
/// bias-corrected S_obs + F1·(F1-1)/2 when there are no doubletons.
pub fn chao1(counts: &[u64]) -> f64 {
    let s_obs = counts.iter().filter(|&&c| c > 0).count() as f64;
    let f1 = counts.iter().filter(|&&c| c == 1).count() as f64;
    let f2 = counts.iter().filter(|&&c| c == 2).count() as f64;

    if f2 > 0.0 {
        s_obs + (f1 * f1) / (2.0 * f2)
    } else {
        s_obs + (f1 * (f1 - 1.0)) / 2.0
    }
}
