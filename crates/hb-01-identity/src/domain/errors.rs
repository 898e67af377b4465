//! # Identity Errors

use thiserror::Error;

/// Errors raised by key handling, signing and verification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// Secret key bytes are not a valid secp256k1 scalar.
    #[error("Invalid secret key")]
    InvalidSecretKey,

    /// Signature string has the wrong length or is not hex.
    #[error("Invalid signature format")]
    InvalidFormat,

    /// Recovery discriminant must be 0, 1, 27 or 28.
    #[error("Invalid recovery ID: {0}")]
    InvalidRecoveryId(u8),

    /// Signature has a high S value.
    #[error("Malleable signature (high S value)")]
    MalleableSignature,

    /// Public key could not be recovered from the signature.
    #[error("Failed to recover public key")]
    RecoveryFailed,

    /// The signing backend rejected the digest.
    #[error("Signing failed")]
    SigningFailed,
}
