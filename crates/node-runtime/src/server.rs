//! # HTTP Surface
//!
//! - `GET /auth`: unauthenticated address proof `{signature, address}`.
//! - `GET /`: WebSocket upgrade. Credentials are checked before upgrading;
//!   a refused request gets the auth error's status code and no socket.

use crate::node::Node;
use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use hb_02_peer_protocol::{server_proof, UpgradeHeaders};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Build the router serving `node`.
pub fn router(node: Arc<Node>) -> Router {
    Router::new()
        .route("/auth", get(auth_proof))
        .route("/", get(upgrade))
        .with_state(node)
}

/// Serve until `shutdown` turns true.
pub async fn serve(
    listener: TcpListener,
    node: Arc<Node>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, hostname = %node.hostname(), "Listening");
    }
    axum::serve(listener, router(node))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
}

async fn auth_proof(State(node): State<Arc<Node>>) -> Response {
    match server_proof(node.identity(), node.hostname()) {
        Ok(proof) => Json(proof).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to sign address proof");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn upgrade(
    State(node): State<Arc<Node>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let credentials = UpgradeHeaders::from_header_map(&headers);
    match node.authenticate(&credentials).await {
        Ok(remote) => ws.on_upgrade(move |socket| async move {
            node.accept(socket, remote);
        }),
        Err(e) => {
            warn!(
                hostname = ?credentials.hostname,
                address = ?credentials.address,
                error = %e,
                "Rejected connection"
            );
            let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::UNAUTHORIZED);
            (status, e.to_string()).into_response()
        }
    }
}
