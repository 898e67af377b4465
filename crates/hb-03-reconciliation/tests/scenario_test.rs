//! End-to-end search rounds over the reconciliation service.

use hb_03_reconciliation::{
    ConfidenceCombiner, MemoryCache, PluginRegistry, Reconciler, ReconcilerConfig, StaticCatalog,
};
use shared_types::metadata::fixtures::track;
use shared_types::{Address, RequestKind, SearchResult, MAX_CONFIDENCE};
use std::sync::Arc;

fn reconciler(local: Vec<SearchResult>, combiner: ConfidenceCombiner) -> Reconciler {
    let plugin = StaticCatalog::new("itunes").with_results(local);
    Reconciler::new(
        PluginRegistry::new().with(Arc::new(plugin)),
        Arc::new(MemoryCache::new()),
        ReconcilerConfig {
            combiner,
            ..ReconcilerConfig::default()
        },
    )
}

fn peer(n: u8) -> Address {
    Address::from_bytes([n; 20])
}

#[tokio::test]
async fn two_honest_peers_collapse_to_one_local_record() {
    let song = track("itunes", "1", "X");
    let reconciler = reconciler(vec![song.clone()], ConfidenceCombiner::Product);
    let mut round = reconciler.begin(RequestKind::Track, "x").await.unwrap();

    let a = round.add_peer(&peer(1), &[song.clone().with_confidence(0.9)]);
    let b = round.add_peer(&peer(2), &[song.clone().with_confidence(0.7)]);
    assert_eq!(a.confidence, 1.0);
    assert_eq!(b.confidence, 1.0);

    let merged = round.finish();
    assert_eq!(merged, vec![song.with_confidence(MAX_CONFIDENCE)]);
}

#[tokio::test]
async fn mismatch_counts_only_against_the_checked_plugin() {
    let song = track("itunes", "1", "X");
    let reconciler = reconciler(vec![song.clone()], ConfidenceCombiner::Product);
    let mut round = reconciler.begin(RequestKind::Track, "x").await.unwrap();

    let liar_unverifiable = track("deezer", "d1", "X").with_confidence(1.0);
    let liar = round.add_peer(
        &peer(1),
        &[track("itunes", "1", "X (Fake)"), liar_unverifiable.clone()],
    );
    assert_eq!(liar.plugins["itunes"].mismatches, 1);
    assert_eq!(liar.confidence, 0.0);

    let honest_unverifiable = track("spotify", "s1", "X").with_confidence(1.0);
    let honest = round.add_peer(&peer(2), &[song.clone(), honest_unverifiable.clone()]);
    assert_eq!(honest.confidence, 1.0);

    let merged = round.finish();
    let confidence_of = |plugin: &str| {
        merged
            .iter()
            .find(|r| r.plugin_id() == plugin)
            .map(SearchResult::confidence)
    };
    assert_eq!(confidence_of("deezer"), Some(0.0));
    assert_eq!(confidence_of("spotify"), Some(1.0));
    // The fabricated itunes record is kept, scored at zero.
    assert_eq!(merged.len(), 4);
}

#[tokio::test]
async fn peer_only_results_average_their_contributions() {
    let reconciler = reconciler(vec![], ConfidenceCombiner::Mean);
    let mut round = reconciler.begin(RequestKind::Track, "y").await.unwrap();

    let record = track("deezer", "d1", "Y");
    round.add_peer(&peer(1), &[record.clone().with_confidence(1.0)]);
    round.add_peer(&peer(2), &[record.clone().with_confidence(0.5)]);

    // Nothing is checkable, so both peers measure 0.0:
    // mean(0, 1) = 0.5 and mean(0, 0.5) = 0.25.
    let merged = round.finish();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].confidence(), 0.375);
}
