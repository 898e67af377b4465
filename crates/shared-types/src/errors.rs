//! # Error Types
//!
//! Parsing errors for the shared entities.

use thiserror::Error;

/// Errors raised while parsing shared entities from untrusted input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    /// Address is not `0x` followed by 40 hex digits.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Hostname does not carry the `ws://` scheme or has no authority.
    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    /// Unknown request type discriminant.
    #[error("Unknown request kind: {0}")]
    UnknownKind(String),

    /// A result record did not match the expected variant shape.
    #[error("Malformed {kind} result: {reason}")]
    MalformedResult { kind: String, reason: String },
}
