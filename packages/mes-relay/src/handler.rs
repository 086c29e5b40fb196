//! WebSocket connection handler.
//!
//! Joins the connection to its room, forwards every frame it sends to the
//! other members, and announces presence on join and leave. Frame contents
//! are never inspected.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state::RelayState;

/// Handle a single WebSocket connection for its lifetime:
/// 1. Joins the room and spawns a sender task for outbound frames
/// 2. Broadcasts the new member count
/// 3. Relays incoming frames until the connection closes
/// 4. Leaves the room and broadcasts the new member count
pub async fn handle_websocket(socket: WebSocket, room_id: String, state: RelayState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let conn_id = Uuid::new_v4().to_string();

    // ── Step 1: Join ──────────────────────────────────────────────────────

    let members = state.join(&room_id, &conn_id, tx);
    tracing::info!(
        room = room_id.as_str(),
        conn = conn_id.as_str(),
        members = members,
        "WebSocket connected"
    );

    let sender_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                break; // Connection closed
            }
        }
    });

    // ── Step 2: Announce ──────────────────────────────────────────────────

    state.broadcast_presence(&room_id);

    // ── Step 3: Relay ─────────────────────────────────────────────────────

    while let Some(msg_result) = ws_receiver.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let len = text.chars().count();
                state.relay(&room_id, &conn_id, Message::Text(text), len);
            }
            Ok(Message::Binary(data)) => {
                let len = data.len();
                state.relay(&room_id, &conn_id, Message::Binary(data), len);
            }
            Ok(Message::Close(_)) => {
                tracing::debug!(conn = conn_id.as_str(), "Client sent close frame");
                break;
            }
            Err(e) => {
                tracing::warn!(
                    conn = conn_id.as_str(),
                    error = %e,
                    "WebSocket error"
                );
                break;
            }
            _ => {} // Ping, Pong — handled by axum
        }
    }

    // ── Step 4: Cleanup ───────────────────────────────────────────────────

    let remaining = state.leave(&room_id, &conn_id);
    state.broadcast_presence(&room_id);
    sender_task.abort();
    tracing::info!(
        room = room_id.as_str(),
        conn = conn_id.as_str(),
        remaining = remaining,
        "WebSocket disconnected"
    );
}
