//! WebSocket connections.
//!
//! - [`DialedConnection`]: outbound, via `tokio-tungstenite`, carrying the
//!   address-proof headers on the upgrade request.
//! - [`AcceptedConnection`]: inbound, wrapping an upgraded `axum` socket.

use super::socket::{spawn_reader, spawn_writer, Inbound, Outbox};
use super::{ConnectionEvent, ConnectionRole, PeerConnection, EVENT_BUFFER};
use crate::auth::{RemoteIdentity, UpgradeHeaders};
use crate::domain::errors::{CloseReason, TransportError};
use axum::extract::ws::{Message as AxumMessage, WebSocket};
use futures::StreamExt;
use shared_types::{Address, Hostname};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, info};

// =============================================================================
// DIALED
// =============================================================================

pub struct DialedConnection {
    remote: RemoteIdentity,
    outbox: Outbox,
}

/// Open an outbound connection to an already verified peer.
///
/// `address` is the one proven by the peer's `/auth` endpoint.
pub async fn dial(
    target: &Hostname,
    address: Address,
    headers: &UpgradeHeaders,
) -> Result<(DialedConnection, mpsc::Receiver<ConnectionEvent>), TransportError> {
    let connect_failed = |reason: String| TransportError::ConnectFailed {
        target: target.to_string(),
        reason,
    };

    let mut request = target
        .as_str()
        .into_client_request()
        .map_err(|e| connect_failed(e.to_string()))?;
    for (name, value) in headers.pairs() {
        let value = HeaderValue::from_str(value).map_err(|_| TransportError::InvalidHeader(name))?;
        request.headers_mut().insert(name, value);
    }

    let (stream, _response) = match tokio_tungstenite::connect_async(request).await {
        Ok(connected) => connected,
        Err(WsError::Http(response)) => {
            return Err(TransportError::Refused {
                target: target.to_string(),
                status: response.status().as_u16(),
            })
        }
        Err(e) => return Err(connect_failed(e.to_string())),
    };
    info!(hostname = %target, peer = %address, "Connected to peer");

    let (sink, stream) = stream.split();
    let open = Arc::new(AtomicBool::new(true));
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

    spawn_writer(sink, commands_rx, |text| WsMessage::text(text), || WsMessage::Close(None));
    spawn_reader(stream, Arc::clone(&open), events_tx, classify_tungstenite);

    let connection = DialedConnection {
        remote: RemoteIdentity::Peer {
            address,
            hostname: target.clone(),
        },
        outbox: Outbox::new(open, commands_tx),
    };
    Ok((connection, events_rx))
}

fn classify_tungstenite(item: Result<WsMessage, WsError>) -> Inbound {
    match item {
        Ok(WsMessage::Text(text)) => Inbound::Text(text.as_str().to_owned()),
        Ok(WsMessage::Close(_)) => Inbound::Closed(CloseReason::RemoteClosed),
        Ok(WsMessage::Binary(_)) => {
            debug!("Ignoring binary frame");
            Inbound::Skip
        }
        Ok(_) => Inbound::Skip,
        Err(e) => Inbound::Closed(CloseReason::Transport(e.to_string())),
    }
}

impl PeerConnection for DialedConnection {
    fn role(&self) -> ConnectionRole {
        ConnectionRole::Dialed
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

// =============================================================================
// ACCEPTED
// =============================================================================

pub struct AcceptedConnection {
    remote: RemoteIdentity,
    outbox: Outbox,
}

/// Wrap a socket upgraded by the HTTP server after authentication.
pub fn accept(
    socket: WebSocket,
    remote: RemoteIdentity,
) -> (AcceptedConnection, mpsc::Receiver<ConnectionEvent>) {
    let (sink, stream) = socket.split();
    let open = Arc::new(AtomicBool::new(true));
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

    spawn_writer(sink, commands_rx, AxumMessage::Text, || AxumMessage::Close(None));
    spawn_reader(stream, Arc::clone(&open), events_tx, classify_axum);

    info!(remote = %remote, "Accepted connection");
    let connection = AcceptedConnection {
        remote,
        outbox: Outbox::new(open, commands_tx),
    };
    (connection, events_rx)
}

fn classify_axum(item: Result<AxumMessage, axum::Error>) -> Inbound {
    match item {
        Ok(AxumMessage::Text(text)) => Inbound::Text(text),
        Ok(AxumMessage::Close(_)) => Inbound::Closed(CloseReason::RemoteClosed),
        Ok(AxumMessage::Binary(_)) => {
            debug!("Ignoring binary frame");
            Inbound::Skip
        }
        Ok(AxumMessage::Ping(_)) | Ok(AxumMessage::Pong(_)) => Inbound::Skip,
        Err(e) => Inbound::Closed(CloseReason::Transport(e.to_string())),
    }
}

impl PeerConnection for AcceptedConnection {
    fn role(&self) -> ConnectionRole {
        ConnectionRole::Accepted
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
