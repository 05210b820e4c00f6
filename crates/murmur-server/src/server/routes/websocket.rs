//! Relay over WebSocket
//!
//! Each socket becomes one relay connection. Inbound frames go to the hub as
//! they arrive; outbound frames are queued by the hub and written by a
//! per-socket writer task.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::server::AppState;

/// Create the WebSocket router
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(websocket_handler))
}

/// GET /
///
/// Upgrades the HTTP connection to a relay WebSocket.
async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> Response {
    debug!(remote = %addr, "WebSocket connection request");

    ws.on_upgrade(move |socket| handle_socket(socket, addr, state))
}

/// Drive one relay connection until either side closes it
async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: Arc<AppState>) {
    let (outbox, mut queue) = mpsc::channel::<String>(state.outbound_buffer);

    let id = match state.relay.accept(outbox).await {
        Ok(id) => id,
        Err(e) => {
            warn!(remote = %addr, error = %e, "Rejecting connection");
            return;
        }
    };
    info!(id = %id, remote = %addr, "Connection accepted");

    let (mut sender, mut receiver) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(frame) = queue.recv().await {
            if let Err(e) = sender.send(Message::Text(frame)).await {
                debug!(id = %id, error = %e, "Failed to send WebSocket message");
                break;
            }
        }
        let _ = sender.close().await;
    });

    while let Some(msg) = receiver.next().await {
        let payload = match msg {
            Ok(Message::Text(text)) => text.into_bytes(),
            Ok(Message::Binary(data)) => data,
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => {
                debug!(id = %id, "WebSocket close requested");
                break;
            }
            Err(e) => {
                debug!(id = %id, error = %e, "WebSocket error");
                break;
            }
        };

        if let Err(e) = state.relay.received(id, payload).await {
            warn!(id = %id, error = %e, "Relay unavailable, dropping connection");
            break;
        }
    }

    if let Err(e) = state.relay.closed(id).await {
        debug!(id = %id, error = %e, "Close not delivered");
    }
    writer.abort();

    info!(id = %id, remote = %addr, "Connection close");
}
