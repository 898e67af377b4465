//! # Search Result Records
//!
//! Track, artist and album records as produced by metadata plugins and
//! exchanged between peers. Field names are the wire names.
//!
//! Every record carries the identifier of the plugin that produced it, the
//! plugin-native id and a `confidence`. A plugin tags its own direct reads with
//! [`MAX_CONFIDENCE`].

use crate::entities::RequestKind;
use crate::errors::TypeError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Confidence a source assigns to its own direct plugin read.
///
/// Largest integer exactly representable in an IEEE-754 double, so it stays
/// finite and lossless on the JSON wire.
pub const MAX_CONFIDENCE: f64 = 9_007_199_254_740_991.0;

/// Field excluded from the content hash.
const CONFIDENCE_FIELD: &str = "confidence";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub plugin_id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub popularity: u32,
    #[serde(default)]
    pub preview_url: String,
    #[serde(default)]
    pub external_urls: BTreeMap<String, String>,
    #[serde(default)]
    pub image_url: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub plugin_id: String,
    pub name: String,
    #[serde(default)]
    pub popularity: u32,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub external_urls: BTreeMap<String, String>,
    #[serde(default)]
    pub image_url: String,
    pub confidence: f64,
}

/// Album records come from catalogs with sparse metadata, so most fields are
/// optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub plugin_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub artists: Option<Vec<String>>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub total_tracks: Option<u32>,
    #[serde(default)]
    pub album_type: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub external_urls: Option<BTreeMap<String, String>>,
    pub confidence: f64,
}

/// One search result of any kind.
///
/// Serializes as the bare record. Decoding needs the kind from the request
/// that produced it, see [`SearchResult::decode`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchResult {
    Track(Track),
    Artist(Artist),
    Album(Album),
}

impl SearchResult {
    /// Decode a wire record of the given kind.
    pub fn decode(kind: RequestKind, value: serde_json::Value) -> Result<Self, TypeError> {
        let malformed = |e: serde_json::Error| TypeError::MalformedResult {
            kind: kind.to_string(),
            reason: e.to_string(),
        };
        Ok(match kind {
            RequestKind::Track => SearchResult::Track(serde_json::from_value(value).map_err(malformed)?),
            RequestKind::Artist => {
                SearchResult::Artist(serde_json::from_value(value).map_err(malformed)?)
            }
            RequestKind::Album => SearchResult::Album(serde_json::from_value(value).map_err(malformed)?),
        })
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            SearchResult::Track(_) => RequestKind::Track,
            SearchResult::Artist(_) => RequestKind::Artist,
            SearchResult::Album(_) => RequestKind::Album,
        }
    }

    /// Source-native identifier.
    pub fn id(&self) -> &str {
        match self {
            SearchResult::Track(t) => &t.id,
            SearchResult::Artist(a) => &a.id,
            SearchResult::Album(a) => &a.id,
        }
    }

    /// Identifier of the plugin that produced this record.
    pub fn plugin_id(&self) -> &str {
        match self {
            SearchResult::Track(t) => &t.plugin_id,
            SearchResult::Artist(a) => &a.plugin_id,
            SearchResult::Album(a) => &a.plugin_id,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            SearchResult::Track(t) => t.confidence,
            SearchResult::Artist(a) => a.confidence,
            SearchResult::Album(a) => a.confidence,
        }
    }

    pub fn set_confidence(&mut self, confidence: f64) {
        match self {
            SearchResult::Track(t) => t.confidence = confidence,
            SearchResult::Artist(a) => a.confidence = confidence,
            SearchResult::Album(a) => a.confidence = confidence,
        }
    }

    /// Copy of this record with its confidence replaced.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.set_confidence(confidence);
        self
    }

    /// Deterministic identity of the record content.
    ///
    /// SHA-256 over the canonical JSON form (object keys sorted) with the
    /// `confidence` field removed, so the same answer reported with different
    /// confidences hashes identically.
    pub fn content_hash(&self) -> ContentHash {
        let mut value = match serde_json::to_value(self) {
            Ok(value) => value,
            // Records contain only strings, integers, finite floats and maps
            // with string keys, none of which can fail to serialize.
            Err(_) => serde_json::Value::Null,
        };
        if let serde_json::Value::Object(map) = &mut value {
            map.remove(CONFIDENCE_FIELD);
        }
        let canonical = canonical_json(&value);
        let mut hasher = Sha256::new();
        hasher.update(self.kind().as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(canonical.as_bytes());
        ContentHash(hasher.finalize().into())
    }
}

/// SHA-256 content identity of a [`SearchResult`].
/// Compact JSON with object keys sorted at every depth, independent of how
/// `serde_json::Map` orders its entries.
fn canonical_json(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            let fields: Vec<String> = entries
                .into_iter()
                .map(|(key, value)| {
                    format!("{}:{}", Value::from(key.as_str()), canonical_json(value))
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &hex::encode(self.0)[..12])
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod fixtures {
    //! Small record builders for tests across the workspace.
    use super::*;

    pub fn track(plugin: &str, id: &str, name: &str) -> SearchResult {
        SearchResult::Track(Track {
            id: id.to_string(),
            plugin_id: plugin.to_string(),
            name: name.to_string(),
            artists: vec!["Artist".to_string()],
            album: "Album".to_string(),
            duration_ms: 180_000,
            popularity: 50,
            preview_url: String::new(),
            external_urls: BTreeMap::new(),
            image_url: String::new(),
            confidence: MAX_CONFIDENCE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::track;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_ignores_confidence() {
        let a = track("itunes", "1", "Song");
        let b = a.clone().with_confidence(0.25);
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_hash_depends_on_content() {
        let a = track("itunes", "1", "Song");
        let b = track("itunes", "1", "Song (Remastered)");
        let c = track("spotify", "1", "Song");
        assert_ne!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), c.content_hash());
    }

    #[test]
    fn test_hash_is_independent_of_key_order() {
        let forward = json!({
            "id": "7", "plugin_id": "p", "name": "N", "popularity": 3,
            "genres": ["rock"], "followers": 9, "external_urls": {}, "image_url": "",
            "confidence": 1.0
        });
        let reversed = json!({
            "confidence": 2.0, "image_url": "", "external_urls": {}, "followers": 9,
            "genres": ["rock"], "popularity": 3, "name": "N", "plugin_id": "p", "id": "7"
        });
        let a = SearchResult::decode(RequestKind::Artist, forward).unwrap();
        let b = SearchResult::decode(RequestKind::Artist, reversed).unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let value = json!({
            "b": { "d": 1, "c": [{ "f": "x", "e": null }] },
            "a": "q\"uote"
        });
        assert_eq!(
            canonical_json(&value),
            r#"{"a":"q\"uote","b":{"c":[{"e":null,"f":"x"}],"d":1}}"#
        );
    }

    #[test]
    fn test_decode_uses_request_kind() {
        let value = json!({ "id": "a1", "plugin_id": "p", "confidence": 1.0 });
        let album = SearchResult::decode(RequestKind::Album, value.clone()).unwrap();
        assert_eq!(album.kind(), RequestKind::Album);
        assert!(SearchResult::decode(RequestKind::Track, value).is_err());
    }

    #[test]
    fn test_serializes_as_bare_record() {
        let value = serde_json::to_value(track("itunes", "1", "Song")).unwrap();
        assert_eq!(value["plugin_id"], "itunes");
        assert_eq!(value["confidence"], json!(MAX_CONFIDENCE));
    }
}
