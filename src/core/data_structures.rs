//! Core data structures for the eDNA metabarcoding pipeline
//!
//! Reads, ASVs, taxonomic assignments, and sample abundance maps shared by
//! every stage. All types are immutable once a stage has returned them.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// A single sequencing read as supplied by the caller.
///
/// `quality` holds numeric Phred scores (already decoded, not ASCII-offset);
/// reads without scores are still clusterable but skip quality gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Read {
    pub id: String,
    pub sequence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Vec<u8>>,
}

impl Read {
    pub fn new(id: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sequence: sequence.into(),
            quality: None,
        }
    }

    pub fn with_quality(
        id: impl Into<String>,
        sequence: impl Into<String>,
        quality: Vec<u8>,
    ) -> Self {
        Self {
            id: id.into(),
            sequence: sequence.into(),
            quality: Some(quality),
        }
    }

    /// Structural validity: non-empty sequence over {A,C,G,T,N} (case-insensitive)
    /// and, when scores are present, one score per base.
    pub fn is_well_formed(&self) -> bool {
        if self.sequence.is_empty() {
            return false;
        }
        if !self
            .sequence
            .chars()
            .all(|c| matches!(c, 'A' | 'C' | 'G' | 'T' | 'N' | 'a' | 'c' | 'g' | 't' | 'n'))
        {
            return false;
        }
        match &self.quality {
            Some(q) => q.len() == self.sequence.len(),
            None => true,
        }
    }

    pub fn mean_quality(&self) -> Option<f64> {
        let q = self.quality.as_ref()?;
        if q.is_empty() {
            return None;
        }
        let sum: u32 = q.iter().map(|&s| s as u32).sum();
        Some(sum as f64 / q.len() as f64)
    }
}

/// An Amplicon Sequence Variant: one exact (or near-identical) sequence
/// cluster with its member reads.
///
/// Invariants maintained by the clusterer:
/// - member read ids are disjoint across ASVs (exact partition of passed reads)
/// - `total_reads == member_read_ids.len()`
/// - `abundance_rank` is 1-based in descending `total_reads` order,
///   ties broken lexicographically by representative sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asv {
    pub id: String,
    pub representative_sequence: String,
    pub member_read_ids: Vec<String>,
    pub total_reads: usize,
    pub abundance_rank: usize,
}

impl Asv {
    pub fn is_singleton(&self) -> bool {
        self.total_reads == 1
    }
}

/// The seven-rank taxonomic ladder, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaxRank {
    Kingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
}

impl TaxRank {
    pub fn all() -> &'static [TaxRank] {
        &[
            TaxRank::Kingdom,
            TaxRank::Phylum,
            TaxRank::Class,
            TaxRank::Order,
            TaxRank::Family,
            TaxRank::Genus,
            TaxRank::Species,
        ]
    }

    pub fn depth(self) -> usize {
        match self {
            TaxRank::Kingdom => 0,
            TaxRank::Phylum => 1,
            TaxRank::Class => 2,
            TaxRank::Order => 3,
            TaxRank::Family => 4,
            TaxRank::Genus => 5,
            TaxRank::Species => 6,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaxRank::Kingdom => "kingdom",
            TaxRank::Phylum => "phylum",
            TaxRank::Class => "class",
            TaxRank::Order => "order",
            TaxRank::Family => "family",
            TaxRank::Genus => "genus",
            TaxRank::Species => "species",
        }
    }
}

/// Taxonomic assignment for one ASV. Coarser ranks are always filled before
/// finer ones; a low-confidence hit keeps kingdom/phylum and drops the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxonomicAssignment {
    pub asv_id: String,
    pub kingdom: Option<String>,
    pub phylum: Option<String>,
    pub class: Option<String>,
    pub order: Option<String>,
    pub family: Option<String>,
    pub genus: Option<String>,
    pub species: Option<String>,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_match_id: Option<String>,
}

impl TaxonomicAssignment {
    pub fn unassigned(asv_id: impl Into<String>) -> Self {
        Self {
            asv_id: asv_id.into(),
            ..Default::default()
        }
    }

    pub fn rank(&self, rank: TaxRank) -> Option<&str> {
        match rank {
            TaxRank::Kingdom => self.kingdom.as_deref(),
            TaxRank::Phylum => self.phylum.as_deref(),
            TaxRank::Class => self.class.as_deref(),
            TaxRank::Order => self.order.as_deref(),
            TaxRank::Family => self.family.as_deref(),
            TaxRank::Genus => self.genus.as_deref(),
            TaxRank::Species => self.species.as_deref(),
        }
    }

    pub fn set_rank(&mut self, rank: TaxRank, name: String) {
        let slot = match rank {
            TaxRank::Kingdom => &mut self.kingdom,
            TaxRank::Phylum => &mut self.phylum,
            TaxRank::Class => &mut self.class,
            TaxRank::Order => &mut self.order,
            TaxRank::Family => &mut self.family,
            TaxRank::Genus => &mut self.genus,
            TaxRank::Species => &mut self.species,
        };
        *slot = Some(name);
    }

    /// True when no rank was populated at all.
    pub fn is_unassigned(&self) -> bool {
        self.kingdom.is_none()
    }

    /// Finest populated rank name, for abundance summaries.
    pub fn best_label(&self) -> Option<&str> {
        TaxRank::all().iter().rev().find_map(|&rank| self.rank(rank))
    }
}

/// One sample's community composition: taxon name (or ASV id) → count.
pub type SampleAbundance = AHashMap<String, u64>;
