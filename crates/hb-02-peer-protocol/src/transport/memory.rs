//! In-memory connection pairs for tests.
//!
//! Frames sent on one end arrive as events on the other. Closing either end
//! closes both and delivers a `Closed` event to each side.

use super::socket::{Command, Outbox};
use super::{ConnectionEvent, ConnectionRole, PeerConnection, EVENT_BUFFER};
use crate::auth::RemoteIdentity;
use crate::domain::errors::{CloseReason, TransportError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct MemoryConnection {
    role: ConnectionRole,
    remote: RemoteIdentity,
    outbox: Outbox,
}

/// One end of a pair together with its inbound events.
pub type MemoryEnd = (MemoryConnection, mpsc::Receiver<ConnectionEvent>);

/// Create a connected pair.
///
/// The dialed end sees `acceptor` as its remote, the accepted end sees
/// `dialer`.
pub fn pair(dialer: RemoteIdentity, acceptor: RemoteIdentity) -> (MemoryEnd, MemoryEnd) {
    let open = Arc::new(AtomicBool::new(true));
    let (dialed_cmd_tx, dialed_cmd_rx) = mpsc::unbounded_channel();
    let (accepted_cmd_tx, accepted_cmd_rx) = mpsc::unbounded_channel();
    let (dialed_evt_tx, dialed_evt_rx) = mpsc::channel(EVENT_BUFFER);
    let (accepted_evt_tx, accepted_evt_rx) = mpsc::channel(EVENT_BUFFER);

    spawn_pump(
        dialed_cmd_rx,
        Arc::clone(&open),
        accepted_evt_tx.clone(),
        dialed_evt_tx.clone(),
    );
    spawn_pump(accepted_cmd_rx, Arc::clone(&open), dialed_evt_tx, accepted_evt_tx);

    let dialed = MemoryConnection {
        role: ConnectionRole::Dialed,
        remote: acceptor,
        outbox: Outbox::new(Arc::clone(&open), dialed_cmd_tx),
    };
    let accepted = MemoryConnection {
        role: ConnectionRole::Accepted,
        remote: dialer,
        outbox: Outbox::new(open, accepted_cmd_tx),
    };
    ((dialed, dialed_evt_rx), (accepted, accepted_evt_rx))
}

fn spawn_pump(
    mut commands: mpsc::UnboundedReceiver<Command>,
    open: Arc<AtomicBool>,
    remote_events: mpsc::Sender<ConnectionEvent>,
    own_events: mpsc::Sender<ConnectionEvent>,
) {
    tokio::spawn(async move {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Text(text) => {
                    if remote_events.send(ConnectionEvent::Message(text)).await.is_err() {
                        break;
                    }
                }
                Command::Close => break,
            }
        }
        open.store(false, Ordering::Release);
        let _ = remote_events
            .send(ConnectionEvent::Closed(CloseReason::RemoteClosed))
            .await;
        let _ = own_events
            .send(ConnectionEvent::Closed(CloseReason::RemoteClosed))
            .await;
    });
}

impl PeerConnection for MemoryConnection {
    fn role(&self) -> ConnectionRole {
        self.role
    }

    fn remote(&self) -> &RemoteIdentity {
        &self.remote
    }

    fn is_open(&self) -> bool {
        self.outbox.is_open()
    }

    fn send(&self, text: String) -> Result<(), TransportError> {
        self.outbox.send(text)
    }

    fn close(&self) {
        self.outbox.close()
    }
}
