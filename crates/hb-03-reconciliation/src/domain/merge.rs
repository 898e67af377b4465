//! # Result Merge
//!
//! Collapses results from every peer into one entry per content hash.
//!
//! Each peer contributes `combine(agreement, reported_confidence)` to the
//! entry of every result it returned. The published confidence is the mean
//! of an entry's contributions. Local results are injected last at
//! [`MAX_CONFIDENCE`] and override whatever peers said.
//!
//! The merge is commutative: contributions are summed in sorted order, so
//! the outcome does not depend on the order peers answered in.

use super::scoring::ConfidenceCombiner;
use shared_types::{ContentHash, SearchResult, MAX_CONFIDENCE};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct MergeEntry {
    result: SearchResult,
    contributions: Vec<f64>,
    local: bool,
}

impl MergeEntry {
    fn confidence(&self) -> f64 {
        if self.local {
            return MAX_CONFIDENCE;
        }
        let mut sorted = self.contributions.clone();
        sorted.sort_by(f64::total_cmp);
        if sorted.is_empty() {
            return 0.0;
        }
        sorted.iter().sum::<f64>() / sorted.len() as f64
    }
}

/// Accumulates peer contributions for one search.
#[derive(Debug, Clone, Default)]
pub struct ResultMerger {
    entries: BTreeMap<ContentHash, MergeEntry>,
}

impl ResultMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one peer's results, scored with the peer's measured agreement.
    pub fn add_peer(
        &mut self,
        agreement: f64,
        results: &[SearchResult],
        combiner: &ConfidenceCombiner,
    ) {
        for result in results {
            let contribution = combiner.combine(agreement, result.confidence());
            self.entries
                .entry(result.content_hash())
                .or_insert_with(|| MergeEntry {
                    result: result.clone(),
                    contributions: Vec::new(),
                    local: false,
                })
                .contributions
                .push(contribution);
        }
    }

    /// Inject locally observed results at maximal confidence.
    pub fn add_local(&mut self, results: &[SearchResult]) {
        for result in results {
            let entry = self
                .entries
                .entry(result.content_hash())
                .or_insert_with(|| MergeEntry {
                    result: result.clone(),
                    contributions: Vec::new(),
                    local: true,
                });
            entry.result = result.clone();
            entry.local = true;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Published results, ordered by content hash.
    pub fn finish(self) -> Vec<SearchResult> {
        self.entries
            .into_values()
            .map(|entry| {
                let confidence = entry.confidence();
                entry.result.with_confidence(confidence)
            })
            .collect()
    }
}
