//! # Ports Layer
//!
//! - **Driven Ports (Outbound):** metadata plugins and the result cache.

pub mod outbound;

pub use outbound::{MetadataPlugin, NoOpCache, ResultCache};
