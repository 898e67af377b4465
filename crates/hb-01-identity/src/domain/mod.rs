//! Domain layer for node identity.

pub mod errors;
pub mod identity;
pub mod signature;
