//! Search fan-out.
//!
//! Requests go to every open peer concurrently. A peer still negotiating is
//! awaited until its capability arrives or the handshake timer fails it.
//! Answers are merged into one round after all of them settled; the merge
//! does not depend on the order. A failing peer is logged and skipped, never
//! failing the search.

use super::{Node, NodeError};
use futures::future::join_all;
use hb_02_peer_protocol::{PeerSession, RequestError};
use hb_telemetry::log_peer_event;
use shared_types::{RequestKind, SearchResult};
use tracing::{debug, info};

impl Node {
    /// Search local plugins and every peer, and reconcile the answers.
    ///
    /// Fails only when the local plugins fail.
    pub async fn search(&self, kind: RequestKind, query: &str) -> Result<Vec<SearchResult>, NodeError> {
        let mut round = self.reconciler.begin(kind, query).await?;

        let peers = self.open_peers();
        let answers = join_all(peers.iter().map(|peer| async move {
            (peer, ask(peer, kind, query).await)
        }))
        .await;

        let mut answered = 0;
        for (peer, answer) in answers {
            let Some(address) = peer.address() else {
                continue;
            };
            match answer {
                Ok(results) => {
                    answered += 1;
                    let agreement = round.add_peer(&address, &results);
                    if agreement.is_checkable() {
                        peer.record_agreement(agreement.confidence);
                    }
                    log_peer_event!(
                        debug,
                        "Peer answered",
                        address,
                        results = results.len(),
                        agreement = agreement.confidence,
                        historic = ?peer.historic_confidence()
                    );
                }
                Err(RequestError::Handshake(e)) => {
                    log_peer_event!(warn, "Peer never became ready", address, error = %e);
                }
                Err(RequestError::Timeout { nonce }) => {
                    log_peer_event!(warn, "Peer request timed out", address, nonce);
                }
                Err(e) => {
                    log_peer_event!(warn, "Peer request failed", address, error = %e);
                }
            }
        }

        let merged = round.finish();
        info!(
            kind = %kind,
            query,
            peers = peers.len(),
            answered,
            results = merged.len(),
            "Search complete"
        );
        Ok(merged)
    }
}

async fn ask(
    peer: &PeerSession,
    kind: RequestKind,
    query: &str,
) -> Result<Vec<SearchResult>, RequestError> {
    if !peer.is_ready() {
        debug!(remote = %peer.remote(), "Waiting for peer handshake");
        peer.handshake().await?;
    }
    peer.request(kind, query).await
}
