//! In-memory result cache.
//!
//! Keyed on (kind, plugin, id, origin). A record seen again from the same
//! origin is left untouched, like an `ON CONFLICT DO NOTHING` insert.

use crate::domain::CacheError;
use crate::ports::outbound::ResultCache;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared_types::{Address, RequestKind, SearchResult};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Where a cached record was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Plugin,
    Peer(Address),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: RequestKind,
    pub plugin_id: String,
    pub id: String,
    pub origin: Origin,
}

impl CacheKey {
    fn new(result: &SearchResult, origin: Origin) -> Self {
        Self {
            kind: result.kind(),
            plugin_id: result.plugin_id().to_string(),
            id: result.id().to_string(),
            origin,
        }
    }
}

/// Cache statistics.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub inserted: AtomicU64,
    pub conflicts: AtomicU64,
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    records: DashMap<CacheKey, SearchResult>,
    stats: CacheStats,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &CacheKey) -> Option<SearchResult> {
        self.records.get(key).map(|r| r.value().clone())
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn insert(&self, key: CacheKey, result: &SearchResult) -> bool {
        match self.records.entry(key) {
            Entry::Occupied(entry) => {
                trace!(key = ?entry.key(), "Cache record exists");
                self.stats.conflicts.fetch_add(1, Ordering::Relaxed);
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(result.clone());
                self.stats.inserted.fetch_add(1, Ordering::Relaxed);
                true
            }
        }
    }
}

impl ResultCache for MemoryCache {
    fn upsert_from_plugin(&self, result: &SearchResult) -> Result<bool, CacheError> {
        Ok(self.insert(CacheKey::new(result, Origin::Plugin), result))
    }

    fn upsert_from_peer(&self, result: &SearchResult, peer: &Address) -> Result<bool, CacheError> {
        Ok(self.insert(CacheKey::new(result, Origin::Peer(*peer)), result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::metadata::fixtures::track;

    #[test]
    fn test_conflict_does_nothing() {
        let cache = MemoryCache::new();
        let song = track("itunes", "1", "Song");
        assert_eq!(cache.upsert_from_plugin(&song), Ok(true));
        assert_eq!(cache.upsert_from_plugin(&song.clone().with_confidence(0.1)), Ok(false));

        let key = CacheKey::new(&song, Origin::Plugin);
        assert_eq!(cache.get(&key), Some(song));
        assert_eq!(cache.stats().conflicts.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_origin_is_part_of_the_key() {
        let cache = MemoryCache::new();
        let song = track("itunes", "1", "Song");
        let a = Address::from_bytes([1; 20]);
        let b = Address::from_bytes([2; 20]);

        assert_eq!(cache.upsert_from_plugin(&song), Ok(true));
        assert_eq!(cache.upsert_from_peer(&song, &a), Ok(true));
        assert_eq!(cache.upsert_from_peer(&song, &b), Ok(true));
        assert_eq!(cache.upsert_from_peer(&song, &a), Ok(false));
        assert_eq!(cache.len(), 3);
        assert!(cache.get(&CacheKey::new(&song, Origin::Peer(b))).is_some());
    }
}
