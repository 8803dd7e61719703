//! Quality-based read filtering and trimming
//!
//! Implements:
//! - Low-quality end trimming
//! - Length window filtering
//! - Mean-quality thresholds
//! - Per-reason failure accounting and aggregate metrics
//!
//! Malformed reads (empty sequence, non-ACGTN symbols, score/base length
//! mismatch) are counted as failed, never raised as batch errors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::core::Read;

/// Histogram bucket width for read-length distribution (bp).
const LENGTH_BUCKET: usize = 50;

/// Quality filtering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityFilterConfig {
    /// Per-base Phred threshold for end trimming (default: Q15)
    pub min_quality: u8,

    /// Minimum read length after trimming (default: 1bp, so the lower
    /// length gate is opt-in)
    pub min_length: usize,

    /// Maximum read length after trimming (default: 1000bp)
    pub max_length: usize,

    /// Minimum mean quality for the whole (trimmed) read (default: Q20)
    pub min_avg_quality: f64,

    /// Trim low-quality ends before the length check (default: true)
    pub trim_ends: bool,
}

impl Default for QualityFilterConfig {
    fn default() -> Self {
        Self {
            min_quality: 15,
            min_length: 1,
            max_length: 1000,
            min_avg_quality: 20.0,
            trim_ends: true,
        }
    }
}

/// Why a read failed the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    Malformed,
    Length,
    Quality,
}

/// Per-reason failure counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureBreakdown {
    pub malformed: usize,
    pub length: usize,
    pub quality: usize,
}

/// Aggregate metrics for one filter pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterMetrics {
    pub total_reads: usize,
    pub passed_count: usize,
    pub failed_count: usize,
    /// Mean of per-read mean qualities over passed reads with scores.
    pub mean_quality_passed: f64,
    /// Mean trimmed length over passed reads.
    pub mean_length_passed: f64,
    /// Trimmed-length distribution of passed reads, bucketed to 50bp.
    pub length_histogram: BTreeMap<usize, usize>,
    pub failed_by_reason: FailureBreakdown,
}

/// Result of filtering one read batch. Passed reads carry their trimmed
/// sequence and scores; failed reads are returned unmodified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterOutcome {
    pub passed: Vec<Read>,
    pub failed: Vec<Read>,
    pub metrics: FilterMetrics,
}

/// Stateless quality filter service. Constructed once, invoked per batch
/// with an explicit configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityFilter;

impl QualityFilter {
    pub fn new() -> Self {
        Self
    }

    /// Filter and trim a batch of reads.
    pub fn filter(&self, reads: &[Read], config: &QualityFilterConfig) -> FilterOutcome {
        let mut passed = Vec::new();
        let mut failed = Vec::new();
        let mut metrics = FilterMetrics {
            total_reads: reads.len(),
            ..Default::default()
        };

        let mut quality_sum = 0.0;
        let mut quality_n = 0usize;
        let mut length_sum = 0usize;

        for read in reads {
            match self.evaluate(read, config) {
                Ok(trimmed) => {
                    length_sum += trimmed.sequence.len();
                    if let Some(mean_q) = trimmed.mean_quality() {
                        quality_sum += mean_q;
                        quality_n += 1;
                    }
                    let bucket = (trimmed.sequence.len() / LENGTH_BUCKET) * LENGTH_BUCKET;
                    *metrics.length_histogram.entry(bucket).or_insert(0) += 1;
                    passed.push(trimmed);
                }
                Err(reason) => {
                    match reason {
                        FailureReason::Malformed => metrics.failed_by_reason.malformed += 1,
                        FailureReason::Length => metrics.failed_by_reason.length += 1,
                        FailureReason::Quality => metrics.failed_by_reason.quality += 1,
                    }
                    failed.push(read.clone());
                }
            }
        }

        metrics.passed_count = passed.len();
        metrics.failed_count = failed.len();
        if quality_n > 0 {
            metrics.mean_quality_passed = quality_sum / quality_n as f64;
        }
        if !passed.is_empty() {
            metrics.mean_length_passed = length_sum as f64 / passed.len() as f64;
        }

        debug!(
            total = metrics.total_reads,
            passed = metrics.passed_count,
            failed = metrics.failed_count,
            "quality filter pass complete"
        );

        FilterOutcome {
            passed,
            failed,
            metrics,
        }
    }

    /// Evaluate a single read: trim, then gate on length and mean quality.
    fn evaluate(&self, read: &Read, config: &QualityFilterConfig) -> Result<Read, FailureReason> {
        if !read.is_well_formed() {
            return Err(FailureReason::Malformed);
        }

        let trimmed = match &read.quality {
            Some(quality) if config.trim_ends => {
                let (start, end) = trim_bounds(quality, config.min_quality);
                if start >= end {
                    // Nothing above the trim threshold, nothing left to keep.
                    return Err(FailureReason::Quality);
                }
                Read::with_quality(
                    read.id.clone(),
                    &read.sequence[start..end],
                    quality[start..end].to_vec(),
                )
            }
            _ => read.clone(),
        };

        let len = trimmed.sequence.len();
        if len < config.min_length || len > config.max_length {
            return Err(FailureReason::Length);
        }

        // Reads without scores skip the quality gate entirely.
        if let Some(mean_q) = trimmed.mean_quality() {
            if mean_q < config.min_avg_quality {
                return Err(FailureReason::Quality);
            }
        }

        Ok(trimmed)
    }
}

/// Half-open keep range after trimming leading/trailing bases below the
/// per-base threshold. Returns `start >= end` when every base is below it.
fn trim_bounds(quality: &[u8], min_quality: u8) -> (usize, usize) {
    let start = quality
        .iter()
        .position(|&q| q >= min_quality)
        .unwrap_or(quality.len());
    let end = quality
        .iter()
        .rposition(|&q| q >= min_quality)
        .map_or(0, |i| i + 1);
    (start, end)
}
