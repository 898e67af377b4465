//! Driven ports of the peer protocol.

use crate::auth::{AuthProof, RemoteIdentity};
use crate::domain::errors::AuthError;
use crate::domain::frame::RequestMessage;
use crate::session::SessionId;
use async_trait::async_trait;
use shared_types::{Hostname, SearchResult};
use thiserror::Error;

/// Fetches a counterpart's out-of-band `/auth` proof.
#[async_trait]
pub trait AuthEndpointClient: Send + Sync {
    async fn fetch_proof(&self, hostname: &Hostname) -> Result<AuthProof, AuthError>;
}

/// Failure of the host while answering a peer's request.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

/// Callbacks from a session into the node that owns it.
///
/// Sessions hold the handler weakly; once the node is gone, inbound requests
/// and announces are dropped.
#[async_trait]
pub trait SessionHandler: Send + Sync {
    /// Answer a search request received from `from`.
    async fn handle_request(
        &self,
        request: RequestMessage,
        from: &RemoteIdentity,
    ) -> Result<Vec<SearchResult>, HandlerError>;

    /// `from` announced a peer reachable at `hostname`.
    async fn handle_announce(&self, hostname: Hostname, from: &RemoteIdentity);

    /// The session with this id terminated.
    fn session_closed(&self, session_id: SessionId, remote: &RemoteIdentity);
}
