//! Contamination Screening Module
//!
//! Scores ASV sets against known lab-reagent taxa and within-sample
//! abundance structure, producing a clean/not-clean verdict.

pub mod detector;

pub use detector::{
    ContaminationDetector, ContaminationReport, DetectorConfig, FlaggedAsv, SuspicionReason,
};
