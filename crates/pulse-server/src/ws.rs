//! `WebSocket` handler for live population streaming.
//!
//! Clients connect to `GET /ws/population` and receive an
//! `initial_state` message with the figures at connect time, then one
//! `tick` message per broadcast interval. Each connection owns an
//! unbounded channel registered with the [`ConnectionRegistry`]; the
//! broadcast loop writes into the channel and this module's
//! forwarding loop writes to the socket, so a slow peer only ever
//! blocks itself.
//!
//! The connection is unregistered on close, on socket write failure,
//! and when the registry evicts it after a failed delivery.
//!
//! [`ConnectionRegistry`]: pulse_core::ConnectionRegistry

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use pulse_core::{MessageKind, TickMessage};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming population figures.
///
/// # Route
///
/// `GET /ws/population`
pub async fn ws_population(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Handle the `WebSocket` lifecycle: initial state, registry
/// membership, and the forwarding loop.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    debug!("WebSocket client connected");

    // Send the figures as of connect time before joining the
    // broadcast, so the client never renders an empty dashboard.
    let snapshots = state.board.current_all().await;
    let initial =
        TickMessage::from_snapshots(MessageKind::InitialState, state.clock.now(), &snapshots);
    match serde_json::to_string(&initial) {
        Ok(encoded) => {
            let msg: Message = Message::Text(encoded.into());
            if socket.send(msg).await.is_err() {
                debug!("WebSocket client disconnected before initial state");
                return;
            }
        }
        Err(e) => {
            warn!("Failed to serialize initial state: {e}");
            return;
        }
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let id = state.registry.register(tx);

    loop {
        tokio::select! {
            // Forward the next broadcast delivery to the socket.
            outbound = rx.recv() => {
                match outbound {
                    Some(message) => {
                        let msg: Message = Message::Text(message.into());
                        if socket.send(msg).await.is_err() {
                            debug!(%id, "WebSocket client disconnected (send failed)");
                            break;
                        }
                    }
                    None => {
                        debug!(%id, "Connection evicted from registry, closing socket");
                        break;
                    }
                }
            }
            // Check if the client sent a close frame or disconnected.
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(%id, "WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let pong = Message::Pong(data);
                        if socket.send(pong).await.is_err() {
                            debug!(%id, "WebSocket client disconnected (pong failed)");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(%id, "WebSocket error: {e}");
                        break;
                    }
                    _ => {
                        // Ignore other message types (text, binary from client).
                    }
                }
            }
        }
    }

    state.registry.unregister(id);
}
