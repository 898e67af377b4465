//! # Capability Negotiation
//!
//! Per-connection state machine: `AwaitingCapability -> Ready -> Closed`.
//!
//! The handshake outcome is published on a `watch` channel so any number of
//! callers can await readiness. It settles at most once.

use super::capability::Capability;
use super::errors::{CloseReason, HandshakeError, RejectReason};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    AwaitingCapability,
    Ready,
    Closed,
}

/// Observable handshake outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeStatus {
    Pending,
    Ready(Arc<Capability>),
    Failed(HandshakeError),
}

/// Result of feeding a received capability into the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityOutcome {
    /// First valid capability; the connection is now ready.
    Accepted(Arc<Capability>),
    /// A capability was already accepted. Nothing changes.
    Ignored,
    /// Invalid capability; the connection must be terminated.
    Rejected(RejectReason),
    /// The connection is already closed.
    Closed,
}

pub struct Negotiation {
    state: Mutex<NegotiationState>,
    status: watch::Sender<HandshakeStatus>,
    min_version: u32,
}

impl Negotiation {
    pub fn new(min_version: u32) -> Self {
        let (status, _) = watch::channel(HandshakeStatus::Pending);
        Self {
            state: Mutex::new(NegotiationState::AwaitingCapability),
            status,
            min_version,
        }
    }

    pub fn state(&self) -> NegotiationState {
        *self.state.lock()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == NegotiationState::Ready
    }

    /// The remote capability, once accepted.
    pub fn capability(&self) -> Option<Arc<Capability>> {
        match &*self.status.borrow() {
            HandshakeStatus::Ready(capability) => Some(Arc::clone(capability)),
            _ => None,
        }
    }

    /// Apply a received capability.
    pub fn on_capability(&self, capability: Capability) -> CapabilityOutcome {
        let mut state = self.state.lock();
        match *state {
            NegotiationState::Closed => CapabilityOutcome::Closed,
            NegotiationState::Ready => CapabilityOutcome::Ignored,
            NegotiationState::AwaitingCapability => match capability.validate(self.min_version) {
                Ok(()) => {
                    let capability = Arc::new(capability);
                    *state = NegotiationState::Ready;
                    self.settle(HandshakeStatus::Ready(Arc::clone(&capability)));
                    CapabilityOutcome::Accepted(capability)
                }
                Err(reason) => {
                    *state = NegotiationState::Closed;
                    self.settle(HandshakeStatus::Failed(HandshakeError::Rejected(reason.clone())));
                    CapabilityOutcome::Rejected(reason)
                }
            },
        }
    }

    /// Fail a still-pending handshake. Returns whether this call settled it.
    pub fn fail(&self, error: HandshakeError) -> bool {
        let mut state = self.state.lock();
        if *state != NegotiationState::AwaitingCapability {
            return false;
        }
        *state = NegotiationState::Closed;
        self.settle(HandshakeStatus::Failed(error))
    }

    /// Transition to `Closed`, failing the handshake if it was still pending.
    pub fn close(&self, reason: &CloseReason) {
        let mut state = self.state.lock();
        if *state == NegotiationState::AwaitingCapability {
            self.settle(HandshakeStatus::Failed(HandshakeError::ClosedBeforeHandshake(
                reason.clone(),
            )));
        }
        *state = NegotiationState::Closed;
    }

    /// Future resolving with the remote capability or the handshake failure.
    pub fn wait(&self) -> impl Future<Output = Result<Arc<Capability>, HandshakeError>> + Send + 'static {
        let mut rx = self.status.subscribe();
        async move {
            let status = match rx.wait_for(|s| !matches!(s, HandshakeStatus::Pending)).await {
                Ok(status) => status.clone(),
                Err(_) => {
                    return Err(HandshakeError::ClosedBeforeHandshake(CloseReason::Local(
                        "session dropped".to_string(),
                    )))
                }
            };
            match status {
                HandshakeStatus::Ready(capability) => Ok(capability),
                HandshakeStatus::Failed(error) => Err(error),
                HandshakeStatus::Pending => Err(HandshakeError::Timeout),
            }
        }
    }

    fn settle(&self, outcome: HandshakeStatus) -> bool {
        self.status.send_if_modified(|current| {
            if matches!(current, HandshakeStatus::Pending) {
                *current = outcome;
                true
            } else {
                false
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capability::{CAPABILITY_PROTOCOL, MIN_CAPABILITY_VERSION};

    fn negotiation() -> Negotiation {
        Negotiation::new(MIN_CAPABILITY_VERSION)
    }

    #[tokio::test]
    async fn test_valid_capability_reaches_ready() {
        let negotiation = negotiation();
        let waiter = negotiation.wait();
        let outcome = negotiation.on_capability(Capability::local(vec!["p".into()]));
        assert!(matches!(outcome, CapabilityOutcome::Accepted(_)));
        assert_eq!(negotiation.state(), NegotiationState::Ready);
        let capability = waiter.await.unwrap();
        assert!(capability.has_plugin("p"));
    }

    #[tokio::test]
    async fn test_second_capability_is_ignored() {
        let negotiation = negotiation();
        negotiation.on_capability(Capability::local(vec!["first".into()]));
        let outcome = negotiation.on_capability(Capability::local(vec!["second".into()]));
        assert_eq!(outcome, CapabilityOutcome::Ignored);
        assert!(negotiation.capability().unwrap().has_plugin("first"));
    }

    #[tokio::test]
    async fn test_invalid_capability_fails_handshake() {
        let negotiation = negotiation();
        let waiter = negotiation.wait();
        let mut capability = Capability::local(vec![]);
        capability.protocol_versions.remove(&CAPABILITY_PROTOCOL);
        let outcome = negotiation.on_capability(capability);
        assert_eq!(
            outcome,
            CapabilityOutcome::Rejected(RejectReason::MissingCapabilityProtocol)
        );
        assert_eq!(negotiation.state(), NegotiationState::Closed);
        assert_eq!(
            waiter.await.unwrap_err(),
            HandshakeError::Rejected(RejectReason::MissingCapabilityProtocol)
        );
    }

    #[tokio::test]
    async fn test_settles_only_once() {
        let negotiation = negotiation();
        assert!(negotiation.fail(HandshakeError::Timeout));
        assert!(!negotiation.fail(HandshakeError::Timeout));
        let outcome = negotiation.on_capability(Capability::local(vec![]));
        assert_eq!(outcome, CapabilityOutcome::Closed);
        assert_eq!(negotiation.wait().await.unwrap_err(), HandshakeError::Timeout);
    }

    #[tokio::test]
    async fn test_close_before_ready_fails_handshake() {
        let negotiation = negotiation();
        negotiation.close(&CloseReason::RemoteClosed);
        assert_eq!(
            negotiation.wait().await.unwrap_err(),
            HandshakeError::ClosedBeforeHandshake(CloseReason::RemoteClosed)
        );
    }

    #[tokio::test]
    async fn test_close_after_ready_keeps_capability() {
        let negotiation = negotiation();
        negotiation.on_capability(Capability::local(vec![]));
        negotiation.close(&CloseReason::RemoteClosed);
        assert_eq!(negotiation.state(), NegotiationState::Closed);
        assert!(negotiation.wait().await.is_ok());
    }
}
