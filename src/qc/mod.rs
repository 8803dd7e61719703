//! Quality Control Module
//!
//! Provides QC for raw eDNA reads:
//! - Low-quality end trimming
//! - Length and mean-quality filtering
//! - Per-reason failure accounting and batch metrics

pub mod quality_filter;

pub use quality_filter::{
    FailureBreakdown, FailureReason, FilterMetrics, FilterOutcome, QualityFilter,
    QualityFilterConfig,
};
