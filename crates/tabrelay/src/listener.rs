//! WebSocket listener for browser extensions, plus `/health`.
//!
//! The extension dials `ws://localhost:<port>` with no path, so the upgrade
//! lives on `/`. Each connection gets a writer task draining its outbound
//! queue; the read loop routes responses into the correlation table.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use tabproto::{parse_inbound, Inbound};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::peers::PeerId;
use crate::relay::Relay;

pub fn router(relay: Arc<Relay>) -> Router {
    Router::new()
        .route("/", get(upgrade))
        .route("/health", get(health))
        .with_state(relay)
}

pub async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind WebSocket listener on {}", addr))
}

/// Serve until `shutdown` is cancelled.
pub async fn serve(listener: TcpListener, relay: Arc<Relay>, shutdown: CancellationToken) -> Result<()> {
    let local = listener.local_addr().context("Listener has no local address")?;
    info!("Browser extensions can connect to ws://{}", local);

    axum::serve(
        listener,
        router(relay).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await
    .context("WebSocket listener failed")
}

async fn health(State(relay): State<Arc<Relay>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "uptime_secs": relay.uptime().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "peers": relay.peers().len(),
        "pending": relay.table().pending_count(),
    }))
}

async fn upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(relay): State<Arc<Relay>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_peer(socket, addr, relay))
}

async fn handle_peer(socket: WebSocket, addr: SocketAddr, relay: Arc<Relay>) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(relay.outbound_buffer());
    let peer_id = relay.peers().add(addr, outbound_tx).id();

    info!(peer = %peer_id, %addr, "Browser connected");

    let writer = tokio::spawn(async move {
        while let Some(text) = outbound_rx.recv().await {
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => route_frame(&relay, peer_id, text.as_str()),
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => route_frame(&relay, peer_id, text),
                Err(_) => warn!(peer = %peer_id, len = bytes.len(), "Dropping non-UTF-8 binary frame"),
            },
            Ok(Message::Close(_)) => break,
            // axum answers pings itself
            Ok(_) => {}
            Err(e) => {
                debug!(peer = %peer_id, error = %e, "Read error");
                break;
            }
        }
    }

    // In-flight requests to this peer are left to time out
    relay.peers().remove(peer_id);
    writer.abort();
    info!(peer = %peer_id, %addr, "Browser disconnected");
}

/// Route one inbound frame. Never fails; anything unusable is logged.
pub(crate) fn route_frame(relay: &Relay, peer: PeerId, text: &str) {
    match parse_inbound(text) {
        Ok(Inbound::Response(response)) => {
            let guid = response.guid;
            let settled = match response.outcome {
                Ok(value) => relay.table().complete(&guid, value),
                Err(message) => relay
                    .table()
                    .fail(&guid, RelayError::PeerReported { message }),
            };
            if !settled {
                debug!(%peer, %guid, response_type = ?response.response_type, "No pending request for response");
            }
        }
        Ok(Inbound::Untagged { response_type }) => {
            debug!(%peer, ?response_type, "Dropping message without responseGuid");
        }
        Err(e) => {
            let err = RelayError::from(e);
            warn!(%peer, error = %err, "Dropping inbound message");
        }
    }
}
