//! Fixed-catalog metadata plugin.
//!
//! Answers from a list of records held in memory, matching the query as a
//! case-insensitive substring of the record name. Used by tests and for
//! running a node against a catalog file without any online source.

use crate::domain::PluginError;
use crate::ports::outbound::MetadataPlugin;
use async_trait::async_trait;
use serde::Deserialize;
use shared_types::{Album, Artist, SearchResult, Track, MAX_CONFIDENCE};

#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    id: String,
    tracks: Vec<Track>,
    artists: Vec<Artist>,
    albums: Vec<Album>,
}

/// On-disk catalog shape: `{"tracks": [...], "artists": [...], "albums": [...]}`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogFile {
    tracks: Vec<Track>,
    artists: Vec<Artist>,
    albums: Vec<Album>,
}

impl StaticCatalog {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Load a catalog from JSON. Records are re-tagged with this plugin's id
    /// and maximal confidence.
    pub fn from_json(id: impl Into<String>, json: &str) -> Result<Self, PluginError> {
        let id = id.into();
        let file: CatalogFile = serde_json::from_str(json).map_err(|e| PluginError::Failed {
            plugin: id.clone(),
            reason: e.to_string(),
        })?;
        let mut catalog = Self::new(id);
        for track in file.tracks {
            catalog.push(SearchResult::Track(track));
        }
        for artist in file.artists {
            catalog.push(SearchResult::Artist(artist));
        }
        for album in file.albums {
            catalog.push(SearchResult::Album(album));
        }
        Ok(catalog)
    }

    pub fn with_results(mut self, results: impl IntoIterator<Item = SearchResult>) -> Self {
        for result in results {
            self.push(result);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.tracks.len() + self.artists.len() + self.albums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, result: SearchResult) {
        match result.with_confidence(MAX_CONFIDENCE) {
            SearchResult::Track(mut t) => {
                t.plugin_id = self.id.clone();
                self.tracks.push(t);
            }
            SearchResult::Artist(mut a) => {
                a.plugin_id = self.id.clone();
                self.artists.push(a);
            }
            SearchResult::Album(mut a) => {
                a.plugin_id = self.id.clone();
                self.albums.push(a);
            }
        }
    }
}

fn matches(name: &str, query: &str) -> bool {
    name.to_lowercase().contains(&query.trim().to_lowercase())
}

#[async_trait]
impl MetadataPlugin for StaticCatalog {
    fn id(&self) -> &str {
        &self.id
    }

    async fn search_track(&self, query: &str) -> Result<Vec<Track>, PluginError> {
        Ok(self
            .tracks
            .iter()
            .filter(|t| matches(&t.name, query))
            .cloned()
            .collect())
    }

    async fn search_artist(&self, query: &str) -> Result<Vec<Artist>, PluginError> {
        Ok(self
            .artists
            .iter()
            .filter(|a| matches(&a.name, query))
            .cloned()
            .collect())
    }

    async fn search_album(&self, query: &str) -> Result<Vec<Album>, PluginError> {
        Ok(self
            .albums
            .iter()
            .filter(|a| a.name.as_deref().is_some_and(|name| matches(name, query)))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::RequestKind;

    const CATALOG: &str = r#"{
        "tracks": [
            {"id": "1", "plugin_id": "x", "name": "Blue Monday", "confidence": 0.3},
            {"id": "2", "plugin_id": "x", "name": "Ceremony", "confidence": 0.3}
        ],
        "albums": [
            {"id": "a1", "plugin_id": "x", "name": "Power, Corruption & Lies", "confidence": 1.0},
            {"id": "a2", "plugin_id": "x", "confidence": 1.0}
        ]
    }"#;

    #[tokio::test]
    async fn test_from_json_retags_records() {
        let catalog = StaticCatalog::from_json("local", CATALOG).unwrap();
        assert_eq!(catalog.len(), 4);

        let found = catalog.search(RequestKind::Track, "blue").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].plugin_id(), "local");
        assert_eq!(found[0].confidence(), MAX_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_album_without_name_never_matches() {
        let catalog = StaticCatalog::from_json("local", CATALOG).unwrap();
        let found = catalog.search(RequestKind::Album, "").await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(catalog.search(RequestKind::Artist, "blue").await.unwrap().is_empty());
    }

    #[test]
    fn test_invalid_json_is_a_plugin_error() {
        assert!(matches!(
            StaticCatalog::from_json("local", r#"{"tracks": 5}"#),
            Err(PluginError::Failed { .. })
        ));
    }
}
