//! # Protocol Errors
//!
//! Error taxonomy for the peer protocol. Authentication failures abort a
//! connection attempt, protocol violations close the socket, request errors
//! are local to one pending request.

use shared_types::TypeError;
use std::fmt;
use thiserror::Error;

/// Why a session was closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The remote side closed the socket.
    RemoteClosed,
    /// Closed locally, e.g. on node shutdown.
    Local(String),
    /// The remote side broke the wire protocol.
    ProtocolViolation(String),
    /// No valid capability arrived in time.
    HandshakeTimeout,
    /// The underlying socket failed.
    Transport(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteClosed => write!(f, "remote closed the connection"),
            Self::Local(reason) => write!(f, "closed locally: {reason}"),
            Self::ProtocolViolation(reason) => write!(f, "protocol violation: {reason}"),
            Self::HandshakeTimeout => write!(f, "capability handshake timed out"),
            Self::Transport(reason) => write!(f, "transport failure: {reason}"),
        }
    }
}

/// Why a received capability was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("capability message did not parse: {0}")]
    ParseFailed(String),

    #[error("capability protocol missing from advertised versions")]
    MissingCapabilityProtocol,

    #[error("capability protocol version {advertised} below required {required}")]
    VersionTooLow { advertised: u32, required: u32 },
}

/// Terminal failure of the capability handshake.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    #[error("capability rejected: {0}")]
    Rejected(RejectReason),

    #[error("no capability received before the handshake timeout")]
    Timeout,

    #[error("connection closed before handshake: {0}")]
    ClosedBeforeHandshake(CloseReason),
}

/// Malformed or out-of-order wire traffic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("{0} received before capability handshake")]
    BeforeCapability(&'static str),

    #[error("{0} frame without nonce")]
    MissingNonce(&'static str),

    #[error("capability rejected: {0}")]
    CapabilityRejected(RejectReason),

    #[error("frame encoding failed: {0}")]
    Encode(String),
}

/// Failure of a single outbound request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// Capability negotiation has not reached `Ready`.
    #[error("session is not ready for requests")]
    NotReady,

    /// Capability negotiation failed while the request waited for it.
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("request {nonce} timed out")]
    Timeout { nonce: u64 },

    #[error("request {nonce} failed: {reason}")]
    Closed { nonce: u64, reason: CloseReason },

    #[error("session closed: {0}")]
    SessionClosed(CloseReason),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl From<TypeError> for RequestError {
    fn from(e: TypeError) -> Self {
        RequestError::MalformedResponse(e.to_string())
    }
}

/// Failure to prove or verify a peer's address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing authentication")]
    MissingCredentials,

    #[error("missing {0} header")]
    MissingHeader(&'static str),

    #[error("malformed {field}: {reason}")]
    Malformed { field: &'static str, reason: String },

    #[error("invalid API key")]
    InvalidApiKey,

    /// The connecting side's header signature does not match our hostname.
    #[error("authentication failed")]
    InvalidSignature,

    /// The counterpart's `/auth` proof is invalid or for another address.
    #[error("invalid authentication from {0}")]
    InvalidProof(String),

    #[error("auth endpoint {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("refusing to connect to own address")]
    SelfConnection,

    #[error("signing failed: {0}")]
    Signing(String),
}

impl AuthError {
    /// HTTP status used when refusing an upgrade request.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingCredentials | Self::MissingHeader(_) | Self::Malformed { .. } => 400,
            Self::InvalidApiKey | Self::InvalidProof(_) | Self::Unreachable { .. } => 401,
            Self::InvalidSignature => 403,
            Self::SelfConnection => 409,
            Self::Signing(_) => 500,
        }
    }
}

/// Socket-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection is closed")]
    Closed,

    #[error("connect to {target} failed: {reason}")]
    ConnectFailed { target: String, reason: String },

    #[error("upgrade to {target} refused with status {status}")]
    Refused { target: String, status: u16 },

    #[error("invalid upgrade header {0}")]
    InvalidHeader(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_status_codes() {
        assert_eq!(AuthError::MissingCredentials.status_code(), 400);
        assert_eq!(AuthError::MissingHeader("x-address").status_code(), 400);
        assert_eq!(AuthError::InvalidSignature.status_code(), 403);
        assert_eq!(AuthError::InvalidApiKey.status_code(), 401);
        assert_eq!(AuthError::InvalidProof("ws://a:1".into()).status_code(), 401);
        assert_eq!(
            AuthError::Unreachable {
                endpoint: "http://a:1/auth".into(),
                reason: "refused".into()
            }
            .status_code(),
            401
        );
    }

    #[test]
    fn test_close_reason_display() {
        assert_eq!(
            CloseReason::HandshakeTimeout.to_string(),
            "capability handshake timed out"
        );
        let err = RequestError::Closed {
            nonce: 4,
            reason: CloseReason::RemoteClosed,
        };
        assert_eq!(err.to_string(), "request 4 failed: remote closed the connection");
    }
}
