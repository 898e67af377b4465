//! # Domain Layer
//!
//! Pure trust arithmetic: agreement measurement, confidence combining and
//! the commutative merge. No I/O.

pub mod agreement;
pub mod errors;
pub mod merge;
pub mod scoring;

pub use agreement::{measure_agreement, AgreementFormula, LocalBaseline, PeerAgreement, PluginTally};
pub use errors::{CacheError, PluginError, ReconciliationError, UnknownStrategy};
pub use merge::ResultMerger;
pub use scoring::{CombineFn, ConfidenceCombiner};
