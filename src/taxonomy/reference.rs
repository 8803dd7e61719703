//! Reference taxonomy matching
//!
//! The assigner talks to a `ReferenceSource` collaborator: give it a query
//! sequence, get back the best reference hit (percent identity + alignment
//! coverage against a reference database) or nothing. Network-backed
//! implementations live behind this trait; the in-memory implementation
//! below scores k-mer containment so the pipeline runs self-contained.

use ahash::AHashSet;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::TaxRank;

/// A taxonomic lineage, coarsest rank first (kingdom → species).
/// Shorter lineages simply stop at a coarser rank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    pub ranks: Vec<String>,
}

impl Lineage {
    /// Parse a semicolon-delimited taxonomy string,
    /// e.g. "Bacteria;Proteobacteria;Gammaproteobacteria".
    pub fn from_taxonomy_string(s: &str) -> Self {
        let ranks = s
            .split(';')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .take(TaxRank::all().len())
            .map(String::from)
            .collect();
        Self { ranks }
    }

    pub fn name_at(&self, rank: TaxRank) -> Option<&str> {
        self.ranks.get(rank.depth()).map(String::as_str)
    }
}

/// Best-hit candidate returned by a reference lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceHit {
    pub match_id: String,
    pub lineage: Lineage,
    /// Fraction of the query matching the reference, in [0, 1].
    pub identity: f64,
    /// Fraction of the reference covered by the alignment, in [0, 1].
    pub coverage: f64,
}

/// External reference-matching collaborator. Lookups may suspend on I/O;
/// the assigner bounds their concurrency and applies per-call timeouts.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    /// Best hit for a query sequence, or `None` when nothing matches.
    async fn best_hit(&self, sequence: &str) -> Result<Option<ReferenceHit>>;
}

struct ReferenceEntry {
    id: String,
    lineage: Lineage,
    kmers: AHashSet<u64>,
}

/// In-memory reference database scored by shared k-mers.
///
/// Identity is the shared k-mer count over the larger of the two k-mer
/// sets, so only identical sequences reach 1.0; coverage is the fraction
/// of reference k-mers hit by the query. Ties go to the earliest
/// registered entry, keeping lookups deterministic.
pub struct InMemoryReference {
    k: usize,
    entries: Vec<ReferenceEntry>,
}

impl InMemoryReference {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            entries: Vec::new(),
        }
    }

    pub fn with_entry(
        mut self,
        id: impl Into<String>,
        sequence: &str,
        lineage: Lineage,
    ) -> Self {
        self.add_entry(id, sequence, lineage);
        self
    }

    pub fn add_entry(&mut self, id: impl Into<String>, sequence: &str, lineage: Lineage) {
        self.entries.push(ReferenceEntry {
            id: id.into(),
            lineage,
            kmers: kmer_set(sequence, self.k),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ReferenceSource for InMemoryReference {
    async fn best_hit(&self, sequence: &str) -> Result<Option<ReferenceHit>> {
        let query = kmer_set(sequence, self.k);
        if query.is_empty() {
            return Ok(None);
        }

        let mut best: Option<ReferenceHit> = None;
        for entry in &self.entries {
            if entry.kmers.is_empty() {
                continue;
            }
            let shared = query.intersection(&entry.kmers).count();
            if shared == 0 {
                continue;
            }
            let identity = shared as f64 / query.len().max(entry.kmers.len()) as f64;
            let coverage = shared as f64 / entry.kmers.len() as f64;
            let score = identity * coverage;
            let better = match &best {
                Some(hit) => score > hit.identity * hit.coverage,
                None => true,
            };
            if better {
                best = Some(ReferenceHit {
                    match_id: entry.id.clone(),
                    lineage: entry.lineage.clone(),
                    identity,
                    coverage,
                });
            }
        }
        Ok(best)
    }
}

/// Hashed k-mer set of a sequence (uppercased; windows containing N are
/// skipped since they match nothing).
fn kmer_set(sequence: &str, k: usize) -> AHashSet<u64> {
    use std::hash::{BuildHasher, Hash, Hasher};

    let seq = sequence.to_uppercase();
    let bytes = seq.as_bytes();
    let mut set = AHashSet::new();
    if k == 0 || bytes.len() < k {
        return set;
    }

    let state = ahash::RandomState::with_seeds(1, 2, 3, 4);
    for window in bytes.windows(k) {
        if window.iter().any(|&b| b == b'N') {
            continue;
        }
        let mut hasher = state.build_hasher();
        window.hash(&mut hasher);
        set.insert(hasher.finish());
    }
    set
}
