//! # Transport Layer
//!
//! One connection interface with a dialed and an accepted implementation.
//! Inbound traffic and the close notification are delivered on the
//! [`ConnectionEvent`] channel returned alongside each connection; outbound
//! frames are queued to a writer task, so `send` never blocks.

mod socket;
pub mod websocket;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use websocket::{accept, dial, AcceptedConnection, DialedConnection};

use crate::auth::RemoteIdentity;
use crate::domain::errors::{CloseReason, TransportError};

/// Capacity of the per-connection inbound event channel.
pub const EVENT_BUFFER: usize = 256;

/// Which side opened the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    Dialed,
    Accepted,
}

impl std::fmt::Display for ConnectionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dialed => write!(f, "dialed"),
            Self::Accepted => write!(f, "accepted"),
        }
    }
}

/// Inbound notification from a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A text frame arrived.
    Message(String),
    /// The socket closed. Always the last event.
    Closed(CloseReason),
}

/// An authenticated duplex text channel to one remote party.
///
/// The remote identity is fixed at construction: connections only exist
/// after authentication succeeded.
pub trait PeerConnection: Send + Sync {
    fn role(&self) -> ConnectionRole;

    fn remote(&self) -> &RemoteIdentity;

    fn is_open(&self) -> bool;

    /// Queue a text frame. Fails once the connection is closed.
    fn send(&self, text: String) -> Result<(), TransportError>;

    /// Close the connection. Idempotent.
    fn close(&self);
}
