//! Reconciliation error types.

use thiserror::Error;

/// Failure of a metadata plugin.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    #[error("plugin {plugin} failed: {reason}")]
    Failed { plugin: String, reason: String },
}

/// Failure of the result cache. Never interrupts a search.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("cache backend failure: {0}")]
    Backend(String),
}

/// Failure of a whole search round.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconciliationError {
    /// Local plugin execution failed. Peer failures never end up here.
    #[error("local search failed: {0}")]
    LocalSearch(#[from] PluginError),
}

/// Unknown strategy name in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} strategy: {name}")]
pub struct UnknownStrategy {
    pub kind: &'static str,
    pub name: String,
}
