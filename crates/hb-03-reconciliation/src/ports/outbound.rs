//! Outbound (Driven) ports for reconciliation.
//!
//! Metadata sources and the result cache are external collaborators. The
//! node only ever reaches them through these traits.

use crate::domain::{CacheError, PluginError};
use async_trait::async_trait;
use shared_types::{Address, Album, Artist, RequestKind, SearchResult, Track};

/// A metadata source queried for local results.
///
/// Every record a plugin returns carries the plugin's own id and maximal
/// self-confidence.
#[async_trait]
pub trait MetadataPlugin: Send + Sync {
    /// Stable plugin identifier, e.g. `"itunes"`.
    fn id(&self) -> &str;

    async fn search_track(&self, query: &str) -> Result<Vec<Track>, PluginError>;

    async fn search_artist(&self, query: &str) -> Result<Vec<Artist>, PluginError>;

    async fn search_album(&self, query: &str) -> Result<Vec<Album>, PluginError>;

    /// Dispatch on the request kind.
    async fn search(&self, kind: RequestKind, query: &str) -> Result<Vec<SearchResult>, PluginError> {
        Ok(match kind {
            RequestKind::Track => self
                .search_track(query)
                .await?
                .into_iter()
                .map(SearchResult::Track)
                .collect(),
            RequestKind::Artist => self
                .search_artist(query)
                .await?
                .into_iter()
                .map(SearchResult::Artist)
                .collect(),
            RequestKind::Album => self
                .search_album(query)
                .await?
                .into_iter()
                .map(SearchResult::Album)
                .collect(),
        })
    }
}

/// Write-behind store of every observed result.
///
/// Records are unique on (plugin, id, origin). Upserting a record that
/// already exists is a no-op and returns `Ok(false)`.
pub trait ResultCache: Send + Sync {
    fn upsert_from_plugin(&self, result: &SearchResult) -> Result<bool, CacheError>;

    fn upsert_from_peer(&self, result: &SearchResult, peer: &Address) -> Result<bool, CacheError>;
}

/// Cache that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCache;

impl ResultCache for NoOpCache {
    fn upsert_from_plugin(&self, _result: &SearchResult) -> Result<bool, CacheError> {
        Ok(false)
    }

    fn upsert_from_peer(&self, _result: &SearchResult, _peer: &Address) -> Result<bool, CacheError> {
        Ok(false)
    }
}
