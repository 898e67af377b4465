//! # Reconciliation Service
//!
//! Wires the domain to the plugin and cache ports.
//!
//! A search is one [`SearchRound`]:
//! 1. [`Reconciler::begin`] runs the local plugins and fixes the baseline.
//! 2. [`SearchRound::add_peer`] scores and merges each peer's answer, in any
//!    order.
//! 3. [`SearchRound::finish`] injects the local results and publishes.
//!
//! Cache writes happen as results are observed. A failing cache is logged
//! and never affects the results.

use crate::adapters::PluginRegistry;
use crate::domain::{
    measure_agreement, AgreementFormula, ConfidenceCombiner, LocalBaseline, PeerAgreement,
    ReconciliationError, ResultMerger,
};
use crate::ports::outbound::ResultCache;
use shared_types::{Address, RequestKind, SearchResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// Scoring policy of a node.
#[derive(Debug, Clone, Default)]
pub struct ReconcilerConfig {
    pub agreement: AgreementFormula,
    pub combiner: ConfidenceCombiner,
}

pub struct Reconciler {
    plugins: PluginRegistry,
    cache: Arc<dyn ResultCache>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(plugins: PluginRegistry, cache: Arc<dyn ResultCache>, config: ReconcilerConfig) -> Self {
        Self {
            plugins,
            cache,
            config,
        }
    }

    /// Ids of the locally installed plugins, as advertised in the capability.
    pub fn plugin_ids(&self) -> Vec<String> {
        self.plugins.ids()
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Local results only, as served to remote requesters.
    pub async fn search_local(
        &self,
        kind: RequestKind,
        query: &str,
    ) -> Result<Vec<SearchResult>, ReconciliationError> {
        let results = self.plugins.search(kind, query).await?;
        for result in &results {
            if let Err(e) = self.cache.upsert_from_plugin(result) {
                warn!(plugin = result.plugin_id(), id = result.id(), error = %e, "Cache write failed");
            }
        }
        Ok(results)
    }

    /// Start a search round from the local results.
    pub async fn begin(
        &self,
        kind: RequestKind,
        query: &str,
    ) -> Result<SearchRound, ReconciliationError> {
        let local = self.search_local(kind, query).await?;
        let baseline = LocalBaseline::new(&local);
        debug!(
            kind = %kind,
            query,
            local = local.len(),
            confirmed = baseline.confirmed_count(),
            "Local baseline ready"
        );
        Ok(SearchRound {
            kind,
            local,
            baseline,
            merger: ResultMerger::new(),
            config: self.config.clone(),
            cache: Arc::clone(&self.cache),
        })
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("plugins", &self.plugins)
            .field("config", &self.config)
            .finish()
    }
}

/// One search in progress.
pub struct SearchRound {
    kind: RequestKind,
    local: Vec<SearchResult>,
    baseline: LocalBaseline,
    merger: ResultMerger,
    config: ReconcilerConfig,
    cache: Arc<dyn ResultCache>,
}

impl SearchRound {
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn local_results(&self) -> &[SearchResult] {
        &self.local
    }

    /// Score one peer's answer against the baseline and merge it.
    pub fn add_peer(&mut self, peer: &Address, results: &[SearchResult]) -> PeerAgreement {
        for result in results {
            if let Err(e) = self.cache.upsert_from_peer(result, peer) {
                warn!(peer = %peer, id = result.id(), error = %e, "Cache write failed");
            }
        }

        let agreement = measure_agreement(&self.baseline, results, self.config.agreement);
        self.merger
            .add_peer(agreement.confidence, results, &self.config.combiner);
        debug!(
            peer = %peer,
            results = results.len(),
            checkable = agreement.plugins.len(),
            confidence = agreement.confidence,
            "Merged peer results"
        );
        agreement
    }

    /// Inject the local results at maximal confidence and publish.
    pub fn finish(mut self) -> Vec<SearchResult> {
        self.merger.add_local(&self.local);
        self.merger.finish()
    }
}
