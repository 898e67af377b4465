//! # Trust Reconciliation (HB-03)
//!
//! Merges search results collected from local plugins and untrusted peers
//! into one scored result set, with no central arbiter.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): agreement measurement, confidence
//!   combiners, commutative merge.
//! - **Ports Layer** (`ports/`): `MetadataPlugin` and `ResultCache`.
//! - **Adapters Layer** (`adapters/`): plugin registry, in-memory cache,
//!   fixed-catalog plugin.
//! - **Service Layer** (`service.rs`): `Reconciler` and `SearchRound`.
//!
//! ## Scoring
//!
//! For a peer answer `R` and local results `L`:
//!
//! ```text
//! agreement(peer)  = mean over checkable plugins p of score(match_p, mismatch_p)
//! contribution(r)  = combine(agreement(peer), r.confidence)
//! confidence(hash) = mean of contributions for that hash
//! confidence(l)    = MAX_CONFIDENCE for every l in L
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{MemoryCache, PluginRegistry, StaticCatalog};
pub use domain::{
    measure_agreement, AgreementFormula, CacheError, ConfidenceCombiner, LocalBaseline,
    PeerAgreement, PluginError, PluginTally, ReconciliationError, ResultMerger, UnknownStrategy,
};
pub use ports::{MetadataPlugin, NoOpCache, ResultCache};
pub use service::{Reconciler, ReconcilerConfig, SearchRound};
