//! # Peer Agreement
//!
//! Measures how often a peer's checkable results match what the local
//! plugins produced for the same query.
//!
//! Only plugins the local node runs itself are checkable. For each such
//! plugin the peer reported, results are tallied as matches (content hash is
//! among the local hashes) or mismatches. The peer's measured agreement is
//! the mean of the per-plugin scores.

use super::errors::UnknownStrategy;
use shared_types::{ContentHash, SearchResult};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

/// Per-plugin agreement score from match and mismatch counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgreementFormula {
    /// `x / (x + y)`.
    #[default]
    Ratio,
    /// `(x + 1) / (x + y + 2)`, pulls small samples toward one half.
    Laplace,
}

impl AgreementFormula {
    /// Score for `matches` agreeing and `mismatches` disagreeing results.
    ///
    /// Returns `None` when there is nothing to score.
    pub fn score(self, matches: u32, mismatches: u32) -> Option<f64> {
        let (x, y) = (f64::from(matches), f64::from(mismatches));
        if matches + mismatches == 0 {
            return None;
        }
        Some(match self {
            AgreementFormula::Ratio => x / (x + y),
            AgreementFormula::Laplace => (x + 1.0) / (x + y + 2.0),
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgreementFormula::Ratio => "ratio",
            AgreementFormula::Laplace => "laplace",
        }
    }
}

impl fmt::Display for AgreementFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgreementFormula {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ratio" => Ok(AgreementFormula::Ratio),
            "laplace" => Ok(AgreementFormula::Laplace),
            other => Err(UnknownStrategy {
                kind: "agreement",
                name: other.to_string(),
            }),
        }
    }
}

/// What the local node observed for a query: the reference a peer is
/// checked against.
#[derive(Debug, Clone, Default)]
pub struct LocalBaseline {
    confirmed: HashSet<ContentHash>,
    installed: BTreeSet<String>,
}

impl LocalBaseline {
    /// Baseline from the local results of one query.
    ///
    /// A plugin counts as installed here only if it produced at least one
    /// local result.
    pub fn new(local: &[SearchResult]) -> Self {
        Self {
            confirmed: local.iter().map(SearchResult::content_hash).collect(),
            installed: local.iter().map(|r| r.plugin_id().to_string()).collect(),
        }
    }

    pub fn is_confirmed(&self, hash: &ContentHash) -> bool {
        self.confirmed.contains(hash)
    }

    pub fn is_installed(&self, plugin_id: &str) -> bool {
        self.installed.contains(plugin_id)
    }

    pub fn confirmed_count(&self) -> usize {
        self.confirmed.len()
    }
}

/// Match counts for one plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PluginTally {
    pub matches: u32,
    pub mismatches: u32,
}

/// Agreement measured for one peer in one search.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerAgreement {
    /// Tallies for checkable plugins only.
    pub plugins: BTreeMap<String, PluginTally>,
    /// Mean per-plugin score, 0.0 when nothing was checkable.
    pub confidence: f64,
}

impl PeerAgreement {
    /// Whether any of the peer's results could be checked.
    pub fn is_checkable(&self) -> bool {
        !self.plugins.is_empty()
    }
}

/// Measure a peer's results against the local baseline.
pub fn measure_agreement(
    baseline: &LocalBaseline,
    results: &[SearchResult],
    formula: AgreementFormula,
) -> PeerAgreement {
    let mut plugins: BTreeMap<String, PluginTally> = BTreeMap::new();
    for result in results {
        if !baseline.is_installed(result.plugin_id()) {
            continue;
        }
        let tally = plugins.entry(result.plugin_id().to_string()).or_default();
        if baseline.is_confirmed(&result.content_hash()) {
            tally.matches += 1;
        } else {
            tally.mismatches += 1;
        }
    }

    let scores: Vec<f64> = plugins
        .values()
        .filter_map(|tally| formula.score(tally.matches, tally.mismatches))
        .collect();
    let confidence = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };

    PeerAgreement { plugins, confidence }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::metadata::fixtures::track;

    #[test]
    fn test_ratio_and_laplace_scores() {
        assert_eq!(AgreementFormula::Ratio.score(3, 1), Some(0.75));
        assert_eq!(AgreementFormula::Laplace.score(0, 0), None);
        assert_eq!(AgreementFormula::Laplace.score(1, 1), Some(0.5));
        assert_eq!(AgreementFormula::Laplace.score(2, 0), Some(0.75));
    }

    #[test]
    fn test_formula_from_str() {
        assert_eq!("Ratio".parse(), Ok(AgreementFormula::Ratio));
        assert_eq!(" laplace ".parse(), Ok(AgreementFormula::Laplace));
        assert!("x / (x + y)".parse::<AgreementFormula>().is_err());
    }

    #[test]
    fn test_full_agreement() {
        let local = vec![track("itunes", "1", "Song")];
        let baseline = LocalBaseline::new(&local);
        let agreement = measure_agreement(&baseline, &local, AgreementFormula::Ratio);
        assert_eq!(agreement.confidence, 1.0);
        assert_eq!(
            agreement.plugins["itunes"],
            PluginTally {
                matches: 1,
                mismatches: 0
            }
        );
    }

    #[test]
    fn test_confidence_does_not_affect_matching() {
        let local = vec![track("itunes", "1", "Song")];
        let baseline = LocalBaseline::new(&local);
        let reported = vec![track("itunes", "1", "Song").with_confidence(0.2)];
        let agreement = measure_agreement(&baseline, &reported, AgreementFormula::Ratio);
        assert_eq!(agreement.confidence, 1.0);
    }

    #[test]
    fn test_mismatch_only_affects_its_plugin() {
        let local = vec![track("itunes", "1", "Song"), track("spotify", "s1", "Song")];
        let baseline = LocalBaseline::new(&local);
        let reported = vec![
            track("itunes", "1", "Song (Remastered)"),
            track("spotify", "s1", "Song"),
            track("deezer", "d1", "Song"),
        ];
        let agreement = measure_agreement(&baseline, &reported, AgreementFormula::Ratio);

        assert_eq!(agreement.plugins["itunes"].mismatches, 1);
        assert_eq!(agreement.plugins["spotify"].matches, 1);
        assert!(!agreement.plugins.contains_key("deezer"));
        assert_eq!(agreement.confidence, 0.5);
    }

    #[test]
    fn test_nothing_checkable_scores_zero() {
        let local = vec![track("itunes", "1", "Song")];
        let baseline = LocalBaseline::new(&local);
        let reported = vec![track("deezer", "d1", "Song")];
        let agreement = measure_agreement(&baseline, &reported, AgreementFormula::Ratio);
        assert!(!agreement.is_checkable());
        assert_eq!(agreement.confidence, 0.0);
    }

    #[test]
    fn test_plugin_without_local_hits_is_not_checkable() {
        let baseline = LocalBaseline::new(&[]);
        let reported = vec![track("itunes", "9", "Invented")];
        let agreement = measure_agreement(&baseline, &reported, AgreementFormula::Ratio);
        assert!(agreement.plugins.is_empty());
        assert_eq!(agreement.confidence, 0.0);
    }
}
