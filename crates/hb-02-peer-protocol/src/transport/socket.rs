//! Reader and writer tasks shared by the WebSocket backends.

use super::ConnectionEvent;
use crate::domain::errors::{CloseReason, TransportError};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

pub(crate) enum Command {
    Text(String),
    Close,
}

/// How a backend-specific frame maps onto connection events.
pub(crate) enum Inbound {
    Text(String),
    Closed(CloseReason),
    Skip,
}

/// Sending half shared by every connection implementation.
pub(crate) struct Outbox {
    open: Arc<AtomicBool>,
    commands: mpsc::UnboundedSender<Command>,
}

impl Outbox {
    pub(crate) fn new(open: Arc<AtomicBool>, commands: mpsc::UnboundedSender<Command>) -> Self {
        Self { open, commands }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub(crate) fn send(&self, text: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        self.commands
            .send(Command::Text(text))
            .map_err(|_| TransportError::Closed)
    }

    pub(crate) fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            let _ = self.commands.send(Command::Close);
        }
    }
}

/// Drain queued commands into the socket sink until closed.
pub(crate) fn spawn_writer<S, M>(
    mut sink: S,
    mut commands: mpsc::UnboundedReceiver<Command>,
    text_frame: fn(String) -> M,
    close_frame: fn() -> M,
) where
    S: Sink<M> + Unpin + Send + 'static,
    S::Error: Display,
    M: Send + 'static,
{
    tokio::spawn(async move {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Text(text) => {
                    if let Err(e) = sink.send(text_frame(text)).await {
                        debug!(error = %e, "WebSocket write failed");
                        break;
                    }
                }
                Command::Close => {
                    let _ = sink.send(close_frame()).await;
                    let _ = sink.close().await;
                    break;
                }
            }
        }
        trace!("WebSocket writer finished");
    });
}

/// Forward inbound frames as events until the socket ends.
pub(crate) fn spawn_reader<St, M, E>(
    mut stream: St,
    open: Arc<AtomicBool>,
    events: mpsc::Sender<ConnectionEvent>,
    classify: fn(Result<M, E>) -> Inbound,
) where
    St: Stream<Item = Result<M, E>> + Unpin + Send + 'static,
    M: Send + 'static,
    E: Send + 'static,
{
    tokio::spawn(async move {
        let reason = loop {
            let Some(item) = stream.next().await else {
                break CloseReason::RemoteClosed;
            };
            match classify(item) {
                Inbound::Text(text) => {
                    if events.send(ConnectionEvent::Message(text)).await.is_err() {
                        break CloseReason::Local("session dropped".to_string());
                    }
                }
                Inbound::Closed(reason) => break reason,
                Inbound::Skip => {}
            }
        };
        open.store(false, Ordering::Release);
        debug!(reason = %reason, "WebSocket reader finished");
        let _ = events.send(ConnectionEvent::Closed(reason)).await;
    });
}
