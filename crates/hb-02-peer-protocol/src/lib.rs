//! # Peer Protocol (HB-02)
//!
//! Authenticated, capability-gated request/response protocol spoken between
//! Hydrabase nodes over WebSocket.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): wire frames, capability negotiation state
//!   machine, nonce correlator, announce rules. No sockets.
//! - **Ports Layer** (`ports/`): `AuthEndpointClient` for the out-of-band
//!   `/auth` fetch, `SessionHandler` for the owning node's callbacks.
//! - **Auth** (`auth/`): address proofs, upgrade headers, acceptor checks.
//! - **Transport** (`transport/`): one `PeerConnection` trait with dialed and
//!   accepted WebSocket implementations.
//! - **Session** (`session/`): `PeerSession` binding a connection to its
//!   negotiation and correlator, plus the per-connection dispatch task.
//!
//! ## Connection lifecycle
//!
//! ```text
//! dialer                                   acceptor
//!   | GET /auth  ------------------------->  |  {signature("I am <acceptor>"), address}
//!   | verify proof, refuse own address       |
//!   | WS upgrade + x-signature/x-address/x-hostname
//!   |  ----------------------------------->  |  verify header signature (403)
//!   |  <-----------------------------------  |  GET <dialer>/auth, verify (401)
//!   | {capability}  <--------------------->  | {capability}
//!   | request/response/announce              |
//! ```

pub mod auth;
pub mod domain;
pub mod ports;
pub mod session;
pub mod transport;

pub use auth::{
    authenticate_target, authenticate_upgrade, server_proof, AcceptorContext, AuthProof,
    HttpAuthClient, RemoteIdentity, UpgradeHeaders,
};
pub use domain::{
    evaluate_address, evaluate_announce, should_announce_to, AnnounceDecision, AuthError,
    ANNOUNCE_PROTOCOL,
    Capability, CloseReason, Frame, HandshakeError, Payload, ProtocolError, RejectReason,
    RequestError, RequestMessage, TransportError,
};
pub use ports::{AuthEndpointClient, HandlerError, SessionHandler};
pub use session::{PeerSession, SessionConfig, SessionId};
pub use transport::{ConnectionEvent, ConnectionRole, PeerConnection};
