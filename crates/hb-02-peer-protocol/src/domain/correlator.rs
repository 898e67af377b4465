//! # Request/Response Correlator
//!
//! Matches inbound responses to outbound requests by nonce.
//!
//! Flow:
//! 1. `register()` allocates the next nonce and a pending entry with its own
//!    timer task.
//! 2. The caller sends the request frame and awaits the returned
//!    [`PendingResponse`].
//! 3. The dispatch loop calls `resolve()` when a response arrives.
//! 4. The timer or `close()` rejects whatever is still pending.
//!
//! Nonces start at 0 and are never reused within a connection.

use super::errors::{CloseReason, RequestError};
use super::negotiation::Negotiation;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

type Outcome = Result<Vec<serde_json::Value>, RequestError>;

struct PendingRequest {
    sender: oneshot::Sender<Outcome>,
    timer: AbortHandle,
    registered_at: Instant,
}

#[derive(Default)]
struct Table {
    next_nonce: u64,
    pending: HashMap<u64, PendingRequest>,
    closed: Option<CloseReason>,
}

struct Inner {
    negotiation: Arc<Negotiation>,
    timeout: Duration,
    table: Mutex<Table>,
}

/// Pending-request table of one connection.
#[derive(Clone)]
pub struct Correlator {
    inner: Arc<Inner>,
}

/// Handle to await one registered request.
#[derive(Debug)]
pub struct PendingResponse {
    nonce: u64,
    receiver: oneshot::Receiver<Outcome>,
}

impl PendingResponse {
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Wait for the matching response, the timeout or the connection close.
    pub async fn recv(self) -> Outcome {
        match self.receiver.await {
            Ok(outcome) => outcome,
            // Sender dropped without an outcome: the table itself went away.
            Err(_) => Err(RequestError::Closed {
                nonce: self.nonce,
                reason: CloseReason::Local("correlator dropped".to_string()),
            }),
        }
    }
}

impl Correlator {
    pub fn new(negotiation: Arc<Negotiation>, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                negotiation,
                timeout,
                table: Mutex::new(Table::default()),
            }),
        }
    }

    /// Register a new request. Only legal once negotiation is `Ready`.
    ///
    /// Must be called from within a tokio runtime: the timeout runs as a task.
    pub fn register(&self) -> Result<PendingResponse, RequestError> {
        let mut table = self.inner.table.lock();
        if let Some(reason) = &table.closed {
            return Err(RequestError::SessionClosed(reason.clone()));
        }
        if !self.inner.negotiation.is_ready() {
            return Err(RequestError::NotReady);
        }

        let nonce = table.next_nonce;
        table.next_nonce += 1;

        let (sender, receiver) = oneshot::channel();
        let timer = spawn_timer(Arc::downgrade(&self.inner), nonce, self.inner.timeout);
        table.pending.insert(
            nonce,
            PendingRequest {
                sender,
                timer,
                registered_at: Instant::now(),
            },
        );

        debug!(nonce, pending = table.pending.len(), "Registered pending request");
        Ok(PendingResponse { nonce, receiver })
    }

    /// Complete the request with this nonce. Returns whether one matched.
    pub fn resolve(&self, nonce: u64, payload: Vec<serde_json::Value>) -> bool {
        let entry = self.inner.table.lock().pending.remove(&nonce);
        match entry {
            Some(pending) => {
                pending.timer.abort();
                debug!(
                    nonce,
                    elapsed_ms = pending.registered_at.elapsed().as_millis() as u64,
                    results = payload.len(),
                    "Resolved pending request"
                );
                // The caller may have stopped waiting; that is not an error here.
                let _ = pending.sender.send(Ok(payload));
                true
            }
            None => {
                warn!(nonce, "Response for unknown or expired nonce");
                false
            }
        }
    }

    /// Drop a pending request whose frame never left, without completing it.
    pub fn cancel(&self, nonce: u64) -> bool {
        let entry = self.inner.table.lock().pending.remove(&nonce);
        match entry {
            Some(pending) => {
                pending.timer.abort();
                debug!(nonce, "Cancelled pending request");
                true
            }
            None => false,
        }
    }

    /// Fail the pending handshake and every pending request. Idempotent.
    pub fn close(&self, reason: CloseReason) {
        let drained: Vec<(u64, PendingRequest)> = {
            let mut table = self.inner.table.lock();
            if table.closed.is_some() {
                return;
            }
            table.closed = Some(reason.clone());
            table.pending.drain().collect()
        };

        self.inner.negotiation.close(&reason);

        if !drained.is_empty() {
            debug!(count = drained.len(), reason = %reason, "Failing pending requests");
        }
        for (nonce, pending) in drained {
            pending.timer.abort();
            let _ = pending.sender.send(Err(RequestError::Closed {
                nonce,
                reason: reason.clone(),
            }));
        }
    }

    pub fn pending_count(&self) -> usize {
        self.inner.table.lock().pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.table.lock().closed.is_some()
    }
}

impl Inner {
    fn expire(&self, nonce: u64) {
        let entry = self.table.lock().pending.remove(&nonce);
        if let Some(pending) = entry {
            debug!(nonce, timeout_ms = self.timeout.as_millis() as u64, "Request timed out");
            let _ = pending.sender.send(Err(RequestError::Timeout { nonce }));
        }
    }
}

fn spawn_timer(inner: Weak<Inner>, nonce: u64, timeout: Duration) -> AbortHandle {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        if let Some(inner) = inner.upgrade() {
            inner.expire(nonce);
        }
    })
    .abort_handle()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capability::{Capability, MIN_CAPABILITY_VERSION};
    use serde_json::json;

    fn ready_correlator(timeout: Duration) -> Correlator {
        let negotiation = Arc::new(Negotiation::new(MIN_CAPABILITY_VERSION));
        negotiation.on_capability(Capability::local(vec![]));
        Correlator::new(negotiation, timeout)
    }

    #[tokio::test]
    async fn test_register_requires_ready() {
        let negotiation = Arc::new(Negotiation::new(MIN_CAPABILITY_VERSION));
        let correlator = Correlator::new(negotiation, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(correlator.register().unwrap_err(), RequestError::NotReady);
    }

    #[tokio::test]
    async fn test_nonces_increase_from_zero() {
        let correlator = ready_correlator(DEFAULT_REQUEST_TIMEOUT);
        let nonces: Vec<u64> = (0..3).map(|_| correlator.register().unwrap().nonce()).collect();
        assert_eq!(nonces, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_resolve_matches_by_nonce_out_of_order() {
        let correlator = ready_correlator(DEFAULT_REQUEST_TIMEOUT);
        let first = correlator.register().unwrap();
        let second = correlator.register().unwrap();

        assert!(correlator.resolve(1, vec![json!("b")]));
        assert!(correlator.resolve(0, vec![json!("a")]));

        assert_eq!(first.recv().await.unwrap(), vec![json!("a")]);
        assert_eq!(second.recv().await.unwrap(), vec![json!("b")]);
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_nonce_has_no_side_effects() {
        let correlator = ready_correlator(DEFAULT_REQUEST_TIMEOUT);
        let pending = correlator.register().unwrap();
        assert!(!correlator.resolve(42, vec![]));
        assert_eq!(correlator.pending_count(), 1);
        assert!(correlator.resolve(pending.nonce(), vec![]));
        // Second resolve for the same nonce is stale.
        assert!(!correlator.resolve(pending.nonce(), vec![]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_exactly_at_boundary() {
        let correlator = ready_correlator(DEFAULT_REQUEST_TIMEOUT);
        let start = Instant::now();
        let mut response = Box::pin(correlator.register().unwrap().recv());

        let early = tokio::time::timeout(DEFAULT_REQUEST_TIMEOUT - Duration::from_millis(1), &mut response).await;
        assert!(early.is_err(), "request rejected before its timeout");

        let outcome = response.await;
        assert_eq!(outcome, Err(RequestError::Timeout { nonce: 0 }));
        assert_eq!(start.elapsed(), DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(correlator.pending_count(), 0);

        // The correlator stays usable after a timeout.
        let next = correlator.register().unwrap();
        assert_eq!(next.nonce(), 1);
        assert!(correlator.resolve(1, vec![]));
        assert!(next.recv().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_after_timeout_is_stale() {
        let correlator = ready_correlator(Duration::from_secs(1));
        let pending = correlator.register().unwrap();
        assert_eq!(pending.recv().await, Err(RequestError::Timeout { nonce: 0 }));
        assert!(!correlator.resolve(0, vec![]));
    }

    #[tokio::test]
    async fn test_cancel_removes_entry() {
        let correlator = ready_correlator(DEFAULT_REQUEST_TIMEOUT);
        let pending = correlator.register().unwrap();
        assert!(correlator.cancel(pending.nonce()));
        assert!(!correlator.cancel(pending.nonce()));
        assert_eq!(correlator.pending_count(), 0);
        assert!(pending.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_close_fails_every_pending_once() {
        let correlator = ready_correlator(DEFAULT_REQUEST_TIMEOUT);
        let a = correlator.register().unwrap();
        let b = correlator.register().unwrap();

        correlator.close(CloseReason::RemoteClosed);
        correlator.close(CloseReason::Local("again".into()));

        assert_eq!(
            a.recv().await,
            Err(RequestError::Closed {
                nonce: 0,
                reason: CloseReason::RemoteClosed
            })
        );
        assert_eq!(
            b.recv().await,
            Err(RequestError::Closed {
                nonce: 1,
                reason: CloseReason::RemoteClosed
            })
        );
        assert!(matches!(
            correlator.register(),
            Err(RequestError::SessionClosed(CloseReason::RemoteClosed))
        ));
    }

    #[tokio::test]
    async fn test_close_before_ready_fails_handshake() {
        let negotiation = Arc::new(Negotiation::new(MIN_CAPABILITY_VERSION));
        let correlator = Correlator::new(Arc::clone(&negotiation), DEFAULT_REQUEST_TIMEOUT);
        let handshake = negotiation.wait();
        correlator.close(CloseReason::RemoteClosed);
        assert!(handshake.await.is_err());
    }
}
