//! Peer set bookkeeping: accept, dial, close.
//!
//! One session per remote address. When both nodes dial each other at the
//! same time, each end keeps the connection dialed by the lower address, so
//! both settle on the same socket.

use super::{Node, NodeError};
use axum::extract::ws::WebSocket;
use hb_02_peer_protocol::transport::{self, ConnectionEvent, ConnectionRole, PeerConnection};
use hb_02_peer_protocol::{
    authenticate_target, authenticate_upgrade, evaluate_address, evaluate_announce,
    AcceptorContext, AnnounceDecision, AuthError, CloseReason, PeerSession, RemoteIdentity,
    SessionId, UpgradeHeaders,
};
use shared_types::{Address, Hostname};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Snapshot of one connected peer.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerSummary {
    pub address: Address,
    pub hostname: Hostname,
    pub role: ConnectionRole,
    pub ready: bool,
    pub plugins: Vec<String>,
    pub user_agent: Option<String>,
    pub historic_confidence: Option<f64>,
}

/// Removes a hostname from the in-flight dial set when dropped.
struct DialGuard<'a> {
    node: &'a Node,
    hostname: Hostname,
}

impl<'a> DialGuard<'a> {
    fn acquire(node: &'a Node, hostname: &Hostname) -> Result<Self, NodeError> {
        if !node.dialing.lock().insert(hostname.clone()) {
            return Err(NodeError::DialInProgress(hostname.clone()));
        }
        Ok(Self {
            node,
            hostname: hostname.clone(),
        })
    }
}

impl Drop for DialGuard<'_> {
    fn drop(&mut self) {
        self.node.dialing.lock().remove(&self.hostname);
    }
}

impl Node {
    /// Authenticate an inbound upgrade request.
    pub async fn authenticate(&self, headers: &UpgradeHeaders) -> Result<RemoteIdentity, AuthError> {
        let ctx = AcceptorContext {
            own_hostname: self.hostname(),
            own_address: self.address(),
            api_key: self.api_key(),
        };
        authenticate_upgrade(headers, ctx, self.auth_client()).await
    }

    /// Take over a socket the HTTP server upgraded after [`Node::authenticate`].
    pub fn accept(self: &Arc<Self>, socket: WebSocket, remote: RemoteIdentity) -> Option<Arc<PeerSession>> {
        let (connection, events) = transport::accept(socket, remote);
        self.attach(Arc::new(connection), events)
    }

    /// Verify, dial and handshake with the node at `target`.
    pub async fn connect(self: &Arc<Self>, target: &Hostname) -> Result<Arc<PeerSession>, NodeError> {
        match evaluate_announce(target, self.hostname(), |h| self.is_connected_to(h)) {
            AnnounceDecision::SkipSelf => return Err(NodeError::SelfDial(target.clone())),
            AnnounceDecision::SkipConnected => return Err(NodeError::AlreadyConnected(target.to_string())),
            AnnounceDecision::Dial => {}
        }
        let _guard = DialGuard::acquire(self, target)?;

        let own_address = self.address();
        let address = authenticate_target(target, &own_address, self.auth_client()).await?;
        match evaluate_address(&address, &own_address, |a| self.is_connected(a)) {
            AnnounceDecision::SkipSelf => return Err(NodeError::SelfDial(target.clone())),
            AnnounceDecision::SkipConnected => return Err(NodeError::AlreadyConnected(address.to_string())),
            AnnounceDecision::Dial => {}
        }

        let headers = UpgradeHeaders::for_dial(self.identity(), target, self.hostname(), self.api_key())?;
        let (connection, events) = transport::dial(target, address, &headers).await?;
        let session = self
            .attach(Arc::new(connection), events)
            .ok_or_else(|| NodeError::AlreadyConnected(address.to_string()))?;
        session.handshake().await?;
        Ok(session)
    }

    /// Start a session on an authenticated connection and register it.
    ///
    /// Returns `None` when the connection was refused: it points back at this
    /// node, or it duplicates a live peer and lost the tie-break.
    pub fn attach(
        self: &Arc<Self>,
        connection: Arc<dyn PeerConnection>,
        events: mpsc::Receiver<ConnectionEvent>,
    ) -> Option<Arc<PeerSession>> {
        let remote = connection.remote().clone();
        let Some(address) = remote.address() else {
            let session = self.start_session(connection, events);
            self.clients.write().insert(session.id(), Arc::clone(&session));
            info!(client = %remote, session = session.id(), "API client connected");
            return Some(session);
        };

        if address == self.address() {
            warn!(remote = %remote, "Dropping connection to own address");
            connection.close();
            return None;
        }

        let (session, replaced) = {
            let mut peers = self.peers.write();
            if let Some(existing) = peers.get(&address) {
                if keeps_existing(self.address(), existing, connection.role()) {
                    debug!(peer = %address, role = %connection.role(), "Dropping duplicate connection");
                    connection.close();
                    return None;
                }
            }
            let session = self.start_session(connection, events);
            let replaced = peers.insert(address, Arc::clone(&session));
            (session, replaced)
        };

        if let Some(old) = replaced {
            old.close(CloseReason::Local("replaced by a newer connection".to_string()));
        }
        info!(
            peer = %address,
            hostname = ?session.hostname().map(Hostname::as_str),
            role = %session.role(),
            session = session.id(),
            "Peer connected"
        );
        self.relay_new_peer(&session);
        Some(session)
    }

    fn start_session(
        &self,
        connection: Arc<dyn PeerConnection>,
        events: mpsc::Receiver<ConnectionEvent>,
    ) -> Arc<PeerSession> {
        PeerSession::start(
            connection,
            events,
            self.capability(),
            &self.settings.session,
            self.as_handler(),
        )
    }

    /// Drop a terminated session from the peer or client set.
    pub(super) fn forget_session(&self, session_id: SessionId, remote: &RemoteIdentity) {
        match remote.address() {
            Some(address) => {
                let mut peers = self.peers.write();
                if peers.get(&address).is_some_and(|s| s.id() == session_id) {
                    peers.remove(&address);
                    info!(peer = %address, session = session_id, "Peer disconnected");
                }
            }
            None => {
                if self.clients.write().remove(&session_id).is_some() {
                    info!(client = %remote, session = session_id, "API client disconnected");
                }
            }
        }
    }

    pub fn is_connected(&self, address: &Address) -> bool {
        self.peers.read().get(address).is_some_and(|s| s.is_open())
    }

    pub fn is_connected_to(&self, hostname: &Hostname) -> bool {
        self.peers
            .read()
            .values()
            .any(|s| s.is_open() && s.hostname() == Some(hostname))
    }

    /// Open peer sessions. Sessions found closed are pruned.
    pub fn open_peers(&self) -> Vec<Arc<PeerSession>> {
        let mut peers = self.peers.write();
        peers.retain(|address, session| {
            let open = session.is_open();
            if !open {
                debug!(peer = %address, "Pruning closed peer");
            }
            open
        });
        peers.values().cloned().collect()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    pub fn peer(&self, address: &Address) -> Option<Arc<PeerSession>> {
        self.peers.read().get(address).cloned()
    }

    /// Connected peers, ordered by address.
    pub fn peers(&self) -> Vec<PeerSummary> {
        let mut summaries: Vec<PeerSummary> = self
            .peers
            .read()
            .iter()
            .filter_map(|(address, session)| {
                let hostname = session.hostname()?.clone();
                let capability = session.capability();
                Some(PeerSummary {
                    address: *address,
                    hostname,
                    role: session.role(),
                    ready: session.is_ready(),
                    plugins: session.plugins(),
                    user_agent: capability.map(|c| c.user_agent.clone()),
                    historic_confidence: session.historic_confidence(),
                })
            })
            .collect();
        summaries.sort_by_key(|s| s.address);
        summaries
    }

    /// Close every session. Pending requests fail with the close reason.
    pub fn shutdown(&self) {
        let peers: Vec<_> = self.peers.write().drain().map(|(_, s)| s).collect();
        let clients: Vec<_> = self.clients.write().drain().map(|(_, s)| s).collect();
        info!(peers = peers.len(), clients = clients.len(), "Closing all sessions");
        for session in peers.into_iter().chain(clients) {
            session.close(CloseReason::Local("node shutting down".to_string()));
        }
    }
}

/// Whether `existing` survives a new connection to the same address.
///
/// A closed session is always replaced. Of two connections in opposite
/// directions, the one dialed by the lower address wins; a reconnect in the
/// same direction replaces the old socket.
fn keeps_existing(own: Address, existing: &PeerSession, incoming: ConnectionRole) -> bool {
    if !existing.is_open() || existing.role() == incoming {
        return false;
    }
    let Some(remote) = existing.address() else {
        return false;
    };
    let dialer = |role: ConnectionRole| match role {
        ConnectionRole::Dialed => own,
        ConnectionRole::Accepted => remote,
    };
    dialer(existing.role()) < dialer(incoming)
}
