//! # Adapters Layer
//!
//! In-memory implementations of the outbound ports.

pub mod memory_cache;
pub mod plugin_registry;
pub mod static_catalog;

pub use memory_cache::{CacheKey, CacheStats, MemoryCache, Origin};
pub use plugin_registry::PluginRegistry;
pub use static_catalog::StaticCatalog;
