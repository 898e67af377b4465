//! Inbound frame dispatch.
//!
//! One task per session drains the connection's events in order, so frames
//! from one connection never race each other on the pending-request table.
//! Answering a request and reacting to an announce run in their own tasks so
//! a slow plugin query does not stall response matching.

use super::PeerSession;
use crate::domain::errors::{CloseReason, HandshakeError, ProtocolError, RejectReason};
use crate::domain::capability::Capability;
use crate::domain::frame::{payload_kind, Frame, Payload, RequestMessage};
use crate::domain::negotiation::{CapabilityOutcome, NegotiationState};
use crate::transport::ConnectionEvent;
use shared_types::Hostname;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

pub(super) async fn run(session: Arc<PeerSession>, mut events: mpsc::Receiver<ConnectionEvent>) {
    let reason = loop {
        let Some(event) = events.recv().await else {
            break CloseReason::RemoteClosed;
        };
        match event {
            ConnectionEvent::Message(text) => {
                if let Err(e) = session.dispatch(&text) {
                    warn!(
                        session = session.id(),
                        remote = %session.remote(),
                        error = %e,
                        "Protocol violation, closing connection"
                    );
                    break CloseReason::ProtocolViolation(e.to_string());
                }
            }
            ConnectionEvent::Closed(reason) => break reason,
        }
    };

    session.close(reason);
    if let Some(handler) = session.handler() {
        handler.session_closed(session.id(), session.remote());
    }
    trace!(session = session.id(), "Dispatch loop finished");
}

impl PeerSession {
    fn dispatch(self: &Arc<Self>, text: &str) -> Result<(), ProtocolError> {
        let frame = match Frame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                // A garbled first frame is a failed capability parse.
                if self.state() == NegotiationState::AwaitingCapability {
                    let reason = RejectReason::ParseFailed(e.to_string());
                    self.negotiation()
                        .fail(HandshakeError::Rejected(reason.clone()));
                    return Err(ProtocolError::CapabilityRejected(reason));
                }
                return Err(e);
            }
        };

        let Frame { payload, nonce } = frame;
        match payload {
            Payload::Capability(capability) => self.on_capability(capability),
            Payload::Request(request) => {
                if self.accepts(payload_kind::REQUEST)? {
                    let nonce = nonce.ok_or(ProtocolError::MissingNonce(payload_kind::REQUEST))?;
                    self.spawn_answer(nonce, request);
                }
                Ok(())
            }
            Payload::Response(values) => {
                if self.accepts(payload_kind::RESPONSE)? {
                    let nonce = nonce.ok_or(ProtocolError::MissingNonce(payload_kind::RESPONSE))?;
                    self.on_response(nonce, values);
                }
                Ok(())
            }
            Payload::Announce(announce) => {
                if self.accepts(payload_kind::ANNOUNCE)? {
                    self.spawn_announce(announce.hostname);
                }
                Ok(())
            }
        }
    }

    fn on_capability(&self, capability: Capability) -> Result<(), ProtocolError> {
        match self.negotiation().on_capability(capability) {
            CapabilityOutcome::Accepted(capability) => {
                info!(
                    session = self.id(),
                    remote = %self.remote(),
                    user_agent = %capability.user_agent,
                    plugins = ?capability.plugins,
                    "Peer capability accepted"
                );
                Ok(())
            }
            CapabilityOutcome::Ignored => {
                debug!(session = self.id(), "Ignoring repeated capability");
                Ok(())
            }
            CapabilityOutcome::Rejected(reason) => Err(ProtocolError::CapabilityRejected(reason)),
            CapabilityOutcome::Closed => Ok(()),
        }
    }

    /// Whether a non-capability frame may be processed now. Frames before
    /// the capability are a violation; frames after close are dropped.
    fn accepts(&self, kind: &'static str) -> Result<bool, ProtocolError> {
        match self.state() {
            NegotiationState::Ready => Ok(true),
            NegotiationState::AwaitingCapability => Err(ProtocolError::BeforeCapability(kind)),
            NegotiationState::Closed => {
                trace!(session = self.id(), kind, "Dropping frame after close");
                Ok(false)
            }
        }
    }

    fn on_response(&self, nonce: u64, values: Vec<serde_json::Value>) {
        let count = values.len();
        if self.correlator().resolve(nonce, values) {
            debug!(session = self.id(), nonce, results = count, "Response matched");
        } else {
            warn!(
                session = self.id(),
                remote = %self.remote(),
                nonce,
                "Unexpected response for unknown or expired nonce"
            );
        }
    }

    fn spawn_answer(self: &Arc<Self>, nonce: u64, request: RequestMessage) {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let Some(handler) = session.handler() else {
                return;
            };
            debug!(
                session = session.id(),
                nonce,
                kind = %request.kind,
                query = %request.query,
                "Answering request"
            );
            let results = match handler.handle_request(request, session.remote()).await {
                Ok(results) => results,
                Err(e) => {
                    warn!(session = session.id(), nonce, error = %e, "Local search failed, answering empty");
                    Vec::new()
                }
            };
            let sent = Frame::response(nonce, &results)
                .and_then(|frame| frame.encode())
                .map_err(|e| e.to_string())
                .and_then(|text| session.connection().send(text).map_err(|e| e.to_string()));
            if let Err(e) = sent {
                debug!(session = session.id(), nonce, error = %e, "Response not sent");
            }
        });
    }

    fn spawn_announce(self: &Arc<Self>, hostname: Hostname) {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let Some(handler) = session.handler() else {
                return;
            };
            debug!(session = session.id(), from = %session.remote(), announced = %hostname, "Received announce");
            handler.handle_announce(hostname, session.remote()).await;
        });
    }
}
