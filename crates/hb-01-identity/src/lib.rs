//! # Node Identity (HB-01)
//!
//! Cryptographic identity of a Hydrabase node.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): key handling, message hashing, signing and
//!   recovery-based verification. No I/O.
//!
//! ## Scheme
//!
//! - secp256k1 keys, Ethereum-style addresses: last 20 bytes of
//!   `keccak256(uncompressed_pubkey[1..])`.
//! - Messages are hashed as
//!   `keccak256("\x19Ethereum Signed Message:\n" + len + message)`.
//! - Signatures carry a recovery id, so verifying needs only the message and
//!   the claimed address.

pub mod domain;

pub use domain::errors::IdentityError;
pub use domain::identity::{address_from_pubkey, hash_message, keccak256, Identity};
pub use domain::signature::{recover, verify, Signature};
