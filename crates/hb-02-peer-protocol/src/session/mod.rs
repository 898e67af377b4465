//! # Peer Session
//!
//! Owns one authenticated connection together with its capability
//! negotiation and request correlator. Everything outside this crate talks to
//! a remote node through a `PeerSession`.
//!
//! Lifecycle:
//! 1. [`PeerSession::start`] sends the local capability and spawns the
//!    dispatch task and the handshake timer.
//! 2. [`PeerSession::handshake`] resolves once the remote capability is
//!    accepted, or fails on rejection, timeout or close.
//! 3. [`PeerSession::request`] and [`PeerSession::announce`] are usable
//!    while the session is ready.
//! 4. Close from either side fails everything still pending and notifies the
//!    owning [`SessionHandler`] exactly once.

mod dispatch;
mod trust;

pub use trust::TrustLedger;

use crate::auth::RemoteIdentity;
use crate::domain::capability::{Capability, MIN_CAPABILITY_VERSION};
use crate::domain::correlator::{Correlator, DEFAULT_REQUEST_TIMEOUT};
use crate::domain::errors::{CloseReason, HandshakeError, RequestError};
use crate::domain::frame::Frame;
use crate::domain::gossip::should_announce_to;
use crate::domain::negotiation::{Negotiation, NegotiationState};
use crate::ports::outbound::SessionHandler;
use crate::transport::{ConnectionEvent, ConnectionRole, PeerConnection};
use parking_lot::Mutex;
use shared_types::{Address, Hostname, RequestKind, SearchResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Process-unique session identifier.
pub type SessionId = u64;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Default time allowed for the remote capability to arrive.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-session timing and version policy.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub request_timeout: Duration,
    pub handshake_timeout: Duration,
    pub min_capability_version: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            min_capability_version: MIN_CAPABILITY_VERSION,
        }
    }
}

impl SessionConfig {
    /// Short timeouts for tests.
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Duration::from_secs(2),
            handshake_timeout: Duration::from_secs(1),
            min_capability_version: MIN_CAPABILITY_VERSION,
        }
    }
}

pub struct PeerSession {
    id: SessionId,
    connection: Arc<dyn PeerConnection>,
    negotiation: Arc<Negotiation>,
    correlator: Correlator,
    trust: Mutex<TrustLedger>,
    handler: Weak<dyn SessionHandler>,
}

impl PeerSession {
    /// Start a session on an authenticated connection.
    ///
    /// Sends the local capability as the first frame. Must be called from
    /// within a tokio runtime.
    pub fn start(
        connection: Arc<dyn PeerConnection>,
        events: mpsc::Receiver<ConnectionEvent>,
        local_capability: &Capability,
        config: &SessionConfig,
        handler: Weak<dyn SessionHandler>,
    ) -> Arc<Self> {
        let negotiation = Arc::new(Negotiation::new(config.min_capability_version));
        let correlator = Correlator::new(Arc::clone(&negotiation), config.request_timeout);
        let session = Arc::new(Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            connection,
            negotiation,
            correlator,
            trust: Mutex::new(TrustLedger::default()),
            handler,
        });

        debug!(
            session = session.id,
            remote = %session.remote(),
            role = %session.role(),
            "Starting peer session"
        );

        match Frame::capability(local_capability.clone()).encode() {
            Ok(text) => {
                if let Err(e) = session.connection.send(text) {
                    warn!(session = session.id, error = %e, "Failed to send capability");
                    session.close(CloseReason::Transport(e.to_string()));
                }
            }
            Err(e) => {
                warn!(session = session.id, error = %e, "Failed to encode capability");
                session.close(CloseReason::Local(e.to_string()));
            }
        }

        tokio::spawn(dispatch::run(Arc::clone(&session), events));
        spawn_handshake_timer(Arc::downgrade(&session), config.handshake_timeout);
        session
    }

    /// Wait for capability negotiation to finish.
    pub async fn handshake(&self) -> Result<Arc<Capability>, HandshakeError> {
        self.negotiation.wait().await
    }

    /// Send a search request and wait for the peer's results.
    pub async fn request(
        &self,
        kind: RequestKind,
        query: &str,
    ) -> Result<Vec<SearchResult>, RequestError> {
        if !self.connection.is_open() {
            return Err(RequestError::SessionClosed(CloseReason::RemoteClosed));
        }
        let pending = self.correlator.register()?;
        let nonce = pending.nonce();

        let text = Frame::request(nonce, kind, query)
            .encode()
            .map_err(|e| RequestError::SendFailed(e.to_string()));
        let sent = text.and_then(|text| {
            self.connection
                .send(text)
                .map_err(|e| RequestError::SendFailed(e.to_string()))
        });
        if let Err(e) = sent {
            self.correlator.cancel(nonce);
            return Err(e);
        }

        debug!(session = self.id, nonce, kind = %kind, query, "Sent request");
        let values = pending.recv().await?;
        values
            .into_iter()
            .map(|value| SearchResult::decode(kind, value).map_err(RequestError::from))
            .collect()
    }

    /// Tell this peer about a newly connected peer at `hostname`.
    ///
    /// Skipped when the peer is the announced one, is an anonymous client or
    /// is no longer open. Returns whether the frame was queued.
    pub fn announce(&self, hostname: &Hostname) -> bool {
        if !should_announce_to(self.hostname(), hostname) || !self.is_open() {
            return false;
        }
        let sent = Frame::announce(hostname.clone())
            .encode()
            .map_err(|e| e.to_string())
            .and_then(|text| self.connection.send(text).map_err(|e| e.to_string()));
        match sent {
            Ok(()) => {
                debug!(session = self.id, to = %self.remote(), announced = %hostname, "Sent announce");
                true
            }
            Err(e) => {
                debug!(session = self.id, error = %e, "Announce not sent");
                false
            }
        }
    }

    /// Close the session. Idempotent.
    pub fn close(&self, reason: CloseReason) {
        if !self.correlator.is_closed() {
            info!(session = self.id, remote = %self.remote(), reason = %reason, "Closing peer session");
        }
        self.correlator.close(reason);
        self.connection.close();
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn remote(&self) -> &RemoteIdentity {
        self.connection.remote()
    }

    pub fn address(&self) -> Option<Address> {
        self.remote().address()
    }

    pub fn hostname(&self) -> Option<&Hostname> {
        self.remote().hostname()
    }

    pub fn role(&self) -> ConnectionRole {
        self.connection.role()
    }

    pub fn state(&self) -> NegotiationState {
        self.negotiation.state()
    }

    /// Open and not closed by protocol failure.
    pub fn is_open(&self) -> bool {
        self.connection.is_open() && self.state() != NegotiationState::Closed
    }

    pub fn is_ready(&self) -> bool {
        self.connection.is_open() && self.state() == NegotiationState::Ready
    }

    /// The peer's capability, once negotiated.
    pub fn capability(&self) -> Option<Arc<Capability>> {
        self.negotiation.capability()
    }

    /// Plugins the peer claims to run.
    pub fn plugins(&self) -> Vec<String> {
        self.capability()
            .map(|c| c.plugins.clone())
            .unwrap_or_default()
    }

    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Record the agreement measured for this peer in one search.
    pub fn record_agreement(&self, score: f64) {
        self.trust.lock().record(score);
    }

    /// Mean agreement over every search this session took part in.
    pub fn historic_confidence(&self) -> Option<f64> {
        self.trust.lock().average()
    }

    pub(crate) fn handler(&self) -> Option<Arc<dyn SessionHandler>> {
        self.handler.upgrade()
    }

    pub(crate) fn negotiation(&self) -> &Negotiation {
        &self.negotiation
    }

    pub(crate) fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    pub(crate) fn connection(&self) -> &dyn PeerConnection {
        self.connection.as_ref()
    }
}

impl std::fmt::Debug for PeerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerSession")
            .field("id", &self.id)
            .field("remote", self.remote())
            .field("role", &self.role())
            .field("state", &self.state())
            .finish()
    }
}

fn spawn_handshake_timer(session: Weak<PeerSession>, timeout: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        let Some(session) = session.upgrade() else {
            return;
        };
        if session.negotiation.fail(HandshakeError::Timeout) {
            warn!(
                session = session.id,
                remote = %session.remote(),
                timeout_ms = timeout.as_millis() as u64,
                "Capability handshake timed out"
            );
            session.close(CloseReason::HandshakeTimeout);
        }
    });
}
