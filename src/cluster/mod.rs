//! ASV Clustering Module
//!
//! Groups filtered reads into Amplicon Sequence Variants with deterministic
//! abundance-ranked ordering.

pub mod asv_clusterer;

pub use asv_clusterer::{AsvClusterer, ClusterOutcome, ClusterStats, ClustererConfig};
