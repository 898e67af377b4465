//! # Shared Types Crate
//!
//! Domain entities shared by every Hydrabase crate.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: addresses, hostnames and result records are
//!   defined once here and reused by the identity, protocol and reconciliation
//!   crates.
//! - **Validated Newtypes**: an `Address` or `Hostname` that exists has already
//!   passed parsing; downstream code never re-checks the format.
//! - **Content Addressing**: results are identified by `ContentHash`, so the
//!   same answer reported by two peers collapses to one entry.

pub mod entities;
pub mod errors;
pub mod metadata;

pub use entities::*;
pub use errors::*;
pub use metadata::*;
