//! Property-based tests for hb-03-reconciliation.
//!
//! The merged result set must not depend on the order peers answered in, and
//! local results always win.

use hb_03_reconciliation::{
    measure_agreement, AgreementFormula, ConfidenceCombiner, LocalBaseline, ResultMerger,
};
use proptest::prelude::*;
use shared_types::metadata::fixtures::track;
use shared_types::{SearchResult, MAX_CONFIDENCE};

const PLUGINS: [&str; 3] = ["itunes", "spotify", "deezer"];
const NAMES: [&str; 4] = ["Song", "Song (Live)", "Other", "Remix"];

fn result_strategy() -> impl Strategy<Value = SearchResult> {
    (0usize..PLUGINS.len(), 0usize..NAMES.len(), 0.0f64..=1.0).prop_map(|(p, n, confidence)| {
        track(PLUGINS[p], &n.to_string(), NAMES[n]).with_confidence(confidence)
    })
}

fn peers_strategy() -> impl Strategy<Value = Vec<Vec<SearchResult>>> {
    prop::collection::vec(prop::collection::vec(result_strategy(), 0..6), 1..6)
}

fn merge(local: &[SearchResult], peers: &[Vec<SearchResult>]) -> Vec<SearchResult> {
    let baseline = LocalBaseline::new(local);
    let combiner = ConfidenceCombiner::Product;
    let mut merger = ResultMerger::new();
    for results in peers {
        let agreement = measure_agreement(&baseline, results, AgreementFormula::Ratio);
        merger.add_peer(agreement.confidence, results, &combiner);
    }
    merger.add_local(local);
    merger.finish()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: any processing order of peer answers gives the same output.
    #[test]
    fn merge_is_order_independent(
        local in prop::collection::vec(result_strategy(), 0..4),
        (peers, shuffled) in peers_strategy().prop_flat_map(|peers| {
            let shuffled = Just(peers.clone()).prop_shuffle();
            (Just(peers), shuffled)
        }),
    ) {
        prop_assert_eq!(merge(&local, &peers), merge(&local, &shuffled));
    }

    /// Property: every local result is published at maximal confidence.
    #[test]
    fn local_results_always_win(
        local in prop::collection::vec(result_strategy(), 1..4),
        peers in peers_strategy(),
    ) {
        let merged = merge(&local, &peers);
        for result in &local {
            let hash = result.content_hash();
            let found = merged.iter().filter(|r| r.content_hash() == hash).collect::<Vec<_>>();
            prop_assert_eq!(found.len(), 1);
            prop_assert_eq!(found[0].confidence(), MAX_CONFIDENCE);
        }
    }

    /// Property: measured agreement stays within [0, 1].
    #[test]
    fn agreement_is_bounded(
        local in prop::collection::vec(result_strategy(), 0..4),
        results in prop::collection::vec(result_strategy(), 0..8),
    ) {
        let baseline = LocalBaseline::new(&local);
        for formula in [AgreementFormula::Ratio, AgreementFormula::Laplace] {
            let agreement = measure_agreement(&baseline, &results, formula);
            prop_assert!((0.0..=1.0).contains(&agreement.confidence));
        }
    }
}
