//! Announce relay.
//!
//! A new peer is announced to every other open peer that has not declared
//! itself without the announce protocol. An announced hostname
//! is dialed unless it is this node or already connected; nothing else bounds
//! the relay.

use super::{Node, NodeError};
use hb_02_peer_protocol::{PeerSession, RemoteIdentity, ANNOUNCE_PROTOCOL};
use hb_telemetry::log_peer_event;
use shared_types::Hostname;
use std::sync::Arc;
use tracing::{debug, warn};

impl Node {
    /// Tell every other peer about `session`. Returns how many were told.
    pub(super) fn relay_new_peer(&self, session: &PeerSession) -> usize {
        let Some(hostname) = session.hostname() else {
            return 0;
        };
        let others: Vec<_> = self
            .peers
            .read()
            .values()
            .filter(|peer| peer.id() != session.id())
            .filter(|peer| {
                peer.capability()
                    .map_or(true, |c| c.supports_protocol(ANNOUNCE_PROTOCOL, 1))
            })
            .cloned()
            .collect();
        let sent = others.iter().filter(|peer| peer.announce(hostname)).count();
        debug!(announced = %hostname, sent, "Relayed new peer");
        sent
    }

    pub(super) async fn on_announce(self: &Arc<Self>, hostname: Hostname, from: &RemoteIdentity) {
        if !from.is_peer() {
            debug!(from = %from, announced = %hostname, "Ignoring announce from API client");
            return;
        }
        debug!(from = %from, announced = %hostname, "Received announce");
        self.on_peer_discovered(hostname).await;
    }

    /// Dial a candidate found by discovery or announce. Outcomes are logged.
    pub async fn on_peer_discovered(self: &Arc<Self>, hostname: Hostname) {
        match self.connect(&hostname).await {
            Ok(session) => {
                if let Some(address) = session.address() {
                    log_peer_event!(info, "Connected to discovered peer", address, hostname = %hostname);
                }
            }
            Err(
                e @ (NodeError::SelfDial(_)
                | NodeError::AlreadyConnected(_)
                | NodeError::DialInProgress(_)),
            ) => {
                debug!(hostname = %hostname, reason = %e, "Skipping discovered peer");
            }
            Err(e) => {
                warn!(hostname = %hostname, error = %e, "Failed to connect to peer");
            }
        }
    }
}
