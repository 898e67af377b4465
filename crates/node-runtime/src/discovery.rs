//! # Peer Discovery
//!
//! Discovery hands candidate hostnames to [`Node::on_peer_discovered`]. The
//! node advertises itself under a rendezvous key (the room) and dials what
//! the substrate returns for the same key.

use crate::node::Node;
use async_trait::async_trait;
use futures::future::join_all;
use shared_types::Hostname;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery substrate unavailable: {0}")]
    Unavailable(String),
}

/// A source of peer candidates.
#[async_trait]
pub trait PeerDiscovery: Send + Sync {
    /// Make `hostname` findable under `room`.
    async fn advertise(&self, room: &str, hostname: &Hostname) -> Result<(), DiscoveryError>;

    /// Hostnames currently advertised under `room`.
    async fn candidates(&self, room: &str) -> Result<Vec<Hostname>, DiscoveryError>;
}

/// Fixed list of bootstrap peers, e.g. from `HB_BOOTSTRAP_PEERS`.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    peers: Vec<Hostname>,
}

impl StaticDiscovery {
    pub fn new(peers: Vec<Hostname>) -> Self {
        Self { peers }
    }
}

#[async_trait]
impl PeerDiscovery for StaticDiscovery {
    async fn advertise(&self, room: &str, hostname: &Hostname) -> Result<(), DiscoveryError> {
        debug!(room, hostname = %hostname, "Static discovery does not advertise");
        Ok(())
    }

    async fn candidates(&self, _room: &str) -> Result<Vec<Hostname>, DiscoveryError> {
        Ok(self.peers.clone())
    }
}

/// Advertise `node` and dial every candidate. Returns the number of
/// candidates handed to the node.
pub async fn bootstrap(node: &Arc<Node>, discovery: &dyn PeerDiscovery, room: &str) -> usize {
    if let Err(e) = discovery.advertise(room, node.hostname()).await {
        warn!(room, error = %e, "Failed to advertise node");
    }
    let candidates = match discovery.candidates(room).await {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!(room, error = %e, "Failed to fetch peer candidates");
            return 0;
        }
    };
    info!(room, candidates = candidates.len(), "Bootstrapping from discovery");
    let count = candidates.len();
    join_all(candidates.into_iter().map(|hostname| node.on_peer_discovered(hostname))).await;
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_discovery_returns_configured_peers() {
        let peers = vec![
            Hostname::parse("ws://a:1").unwrap(),
            Hostname::parse("ws://b:2").unwrap(),
        ];
        let discovery = StaticDiscovery::new(peers.clone());
        let own = Hostname::parse("ws://self:3").unwrap();
        assert!(discovery.advertise("hydrabase", &own).await.is_ok());
        assert_eq!(discovery.candidates("hydrabase").await.unwrap(), peers);
    }
}
