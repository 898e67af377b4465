//! # Node
//!
//! Owns the identity, the reconciliation engine and the set of live peer
//! sessions.
//!
//! - `peers`: accept and dial paths, peer set bookkeeping, shutdown.
//! - `gossip`: announce relay on new peers and dialing of announced ones.
//! - `search`: fan-out to every open peer and trust reconciliation.
//!
//! Sessions hold the node weakly through [`SessionHandler`]; dropping the
//! last `Arc<Node>` stops inbound requests from being answered.

mod gossip;
mod peers;
mod search;


pub use peers::PeerSummary;

use async_trait::async_trait;
use hb_01_identity::{Identity, IdentityError};
use hb_02_peer_protocol::{
    AuthEndpointClient, AuthError, Capability, HandlerError, HandshakeError, HttpAuthClient,
    PeerSession, RemoteIdentity, RequestMessage, SessionConfig, SessionHandler, SessionId,
    TransportError,
};
use hb_03_reconciliation::{Reconciler, ReconciliationError};
use parking_lot::{Mutex, RwLock};
use shared_types::{Address, Hostname, SearchResult};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::NodeConfig;

/// Errors surfaced by node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),

    #[error("refusing to dial own hostname {0}")]
    SelfDial(Hostname),

    #[error("already connected to {0}")]
    AlreadyConnected(String),

    #[error("dial to {0} already in progress")]
    DialInProgress(Hostname),
}

/// Connection policy of a node.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    /// Externally reachable hostname this node signs for.
    pub hostname: Hostname,
    pub api_key: Option<String>,
    pub session: SessionConfig,
}

impl NodeSettings {
    pub fn new(hostname: Hostname) -> Self {
        Self {
            hostname,
            api_key: None,
            session: SessionConfig::default(),
        }
    }
}

pub struct Node {
    identity: Identity,
    settings: NodeSettings,
    capability: Capability,
    reconciler: Reconciler,
    auth_client: Arc<dyn AuthEndpointClient>,
    /// Authenticated peers by address.
    peers: RwLock<HashMap<Address, Arc<PeerSession>>>,
    /// Anonymous API-key clients by session id.
    clients: RwLock<HashMap<SessionId, Arc<PeerSession>>>,
    /// Hostnames with a dial in flight.
    dialing: Mutex<HashSet<Hostname>>,
    this: Weak<Node>,
}

impl Node {
    pub fn new(
        identity: Identity,
        settings: NodeSettings,
        reconciler: Reconciler,
        auth_client: Arc<dyn AuthEndpointClient>,
    ) -> Arc<Self> {
        let capability = Capability::local(reconciler.plugin_ids());
        info!(
            address = %identity.address(),
            hostname = %settings.hostname,
            plugins = ?capability.plugins,
            "Node created"
        );
        Arc::new_cyclic(|this| Self {
            identity,
            settings,
            capability,
            reconciler,
            auth_client,
            peers: RwLock::new(HashMap::new()),
            clients: RwLock::new(HashMap::new()),
            dialing: Mutex::new(HashSet::new()),
            this: this.clone(),
        })
    }

    /// Build a node from runtime configuration with the HTTP auth client.
    pub fn from_config(config: &NodeConfig, reconciler: Reconciler) -> Result<Arc<Self>, NodeError> {
        let identity = match config.private_key.as_deref() {
            Some(secret) => Identity::from_secret_hex(secret)?,
            None => {
                debug!("No private key configured, generating identity");
                Identity::generate()
            }
        };
        let settings = NodeSettings {
            hostname: config.hostname.clone(),
            api_key: config.api_key.clone(),
            session: config.session_config(),
        };
        Ok(Self::new(identity, settings, reconciler, Arc::new(HttpAuthClient::default())))
    }

    pub fn address(&self) -> Address {
        self.identity.address()
    }

    pub fn hostname(&self) -> &Hostname {
        &self.settings.hostname
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn api_key(&self) -> Option<&str> {
        self.settings.api_key.as_deref()
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub(crate) fn auth_client(&self) -> &dyn AuthEndpointClient {
        self.auth_client.as_ref()
    }

    fn as_handler(&self) -> Weak<dyn SessionHandler> {
        let this: Weak<dyn SessionHandler> = self.this.clone();
        this
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("address", &self.address())
            .field("hostname", &self.settings.hostname)
            .field("peers", &self.peers.read().len())
            .field("clients", &self.clients.read().len())
            .finish()
    }
}

#[async_trait]
impl SessionHandler for Node {
    async fn handle_request(
        &self,
        request: RequestMessage,
        from: &RemoteIdentity,
    ) -> Result<Vec<SearchResult>, HandlerError> {
        debug!(from = %from, kind = %request.kind, query = %request.query, "Serving peer request");
        self.reconciler
            .search_local(request.kind, &request.query)
            .await
            .map_err(|e| HandlerError(e.to_string()))
    }

    async fn handle_announce(&self, hostname: Hostname, from: &RemoteIdentity) {
        if let Some(node) = self.this.upgrade() {
            node.on_announce(hostname, from).await;
        }
    }

    fn session_closed(&self, session_id: SessionId, remote: &RemoteIdentity) {
        self.forget_session(session_id, remote);
    }
}
