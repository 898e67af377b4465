//! # Domain Layer
//!
//! Wire shapes and per-connection state machines. No sockets here.

pub mod capability;
pub mod correlator;
pub mod errors;
pub mod frame;
pub mod gossip;
pub mod negotiation;

pub use capability::{Capability, ANNOUNCE_PROTOCOL, IMPLEMENTED_PROTOCOLS, MIN_CAPABILITY_VERSION};
pub use correlator::{Correlator, PendingResponse, DEFAULT_REQUEST_TIMEOUT};
pub use errors::{
    AuthError, CloseReason, HandshakeError, ProtocolError, RejectReason, RequestError,
    TransportError,
};
pub use frame::{AnnounceMessage, Frame, Payload, RequestMessage};
pub use gossip::{evaluate_address, evaluate_announce, should_announce_to, AnnounceDecision};
pub use negotiation::{CapabilityOutcome, HandshakeStatus, Negotiation, NegotiationState};
