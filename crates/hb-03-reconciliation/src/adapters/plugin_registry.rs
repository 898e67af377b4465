//! Set of locally installed metadata plugins.

use crate::domain::PluginError;
use crate::ports::outbound::MetadataPlugin;
use shared_types::{RequestKind, SearchResult};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn MetadataPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin. A plugin with an already registered id replaces it.
    pub fn register(&mut self, plugin: Arc<dyn MetadataPlugin>) {
        self.plugins.retain(|p| p.id() != plugin.id());
        self.plugins.push(plugin);
    }

    pub fn with(mut self, plugin: Arc<dyn MetadataPlugin>) -> Self {
        self.register(plugin);
        self
    }

    pub fn ids(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Query every plugin in registration order.
    ///
    /// Fails on the first plugin error.
    pub async fn search(
        &self,
        kind: RequestKind,
        query: &str,
    ) -> Result<Vec<SearchResult>, PluginError> {
        let mut results = Vec::new();
        for plugin in &self.plugins {
            let found = plugin.search(kind, query).await?;
            debug!(plugin = plugin.id(), kind = %kind, query, results = found.len(), "Plugin search");
            results.extend(found);
        }
        Ok(results)
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.ids())
            .finish()
    }
}
