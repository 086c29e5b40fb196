//! MES Relay Server
//!
//! A dumb per-room WebSocket broadcaster for MES ephemeral rooms:
//!
//! 1. **Room fan-out**: every frame a member sends is forwarded to every
//!    other member of the same room, never back to the sender.
//!
//! 2. **Presence**: on each join and leave the room's member count is
//!    broadcast as `{"_control":"online","count":N}`.
//!
//! 3. **Frame guard**: frames above the configured ceiling are dropped.
//!
//! **Privacy**: The relay never sees plaintext content or keys. Frames are
//! sealed client-side and forwarded untouched.

mod handler;
mod protocol;
mod state;

use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::Method,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use clap::Parser;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::{RelayConfig, RelayState, DEFAULT_MAX_FRAME_LEN, DEFAULT_PORT};

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "mes-relay", version, about = "MES ephemeral room relay")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "RELAY_PORT")]
    port: u16,

    /// Largest frame forwarded (characters for text frames, bytes for binary)
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_LEN, env = "MAX_FRAME_LEN")]
    max_frame_len: usize,
}

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mes_relay=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = RelayConfig {
        port: args.port,
        max_frame_len: args.max_frame_len,
    };
    let state = RelayState::new(config);

    let addr = format!("0.0.0.0:{}", state.config.port);
    tracing::info!(
        max_frame_len = state.config.max_frame_len,
        "MES relay server starting on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await
}

/// Build the router.
fn app(state: RelayState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/ws/:room_id", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Route Handlers ────────────────────────────────────────────────────────────

/// WebSocket upgrade handler; the connection joins `room_id`.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    State(state): State<RelayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handler::handle_websocket(socket, room_id, state))
}

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "mes-relay",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Statistics endpoint.
async fn stats_handler(State(state): State<RelayState>) -> impl IntoResponse {
    Json(json!({
        "rooms": state.room_count(),
        "connections": state.connection_count(),
        "frames_relayed": state.frames_relayed(),
        "frames_dropped": state.frames_dropped(),
        "max_frame_len": state.config.max_frame_len,
        "timestamp": chrono::Utc::now().timestamp_millis(),
    }))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    #[test]
    fn test_health_json_structure() {
        let json_val = json!({
            "status": "ok",
            "service": "mes-relay",
            "version": env!("CARGO_PKG_VERSION"),
        });
        assert_eq!(json_val["status"], "ok");
        assert_eq!(json_val["service"], "mes-relay");
    }

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.port, 10000);
        assert_eq!(config.max_frame_len, 1_600_000);
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["mes-relay"]).unwrap();
        assert_eq!(args.port, DEFAULT_PORT);
        assert_eq!(args.max_frame_len, DEFAULT_MAX_FRAME_LEN);

        let args = Args::try_parse_from(["mes-relay", "-p", "9000", "--max-frame-len", "10"])
            .unwrap();
        assert_eq!(args.port, 9000);
        assert_eq!(args.max_frame_len, 10);
    }

    async fn next_text<S>(stream: &mut S) -> String
    where
        S: StreamExt<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), stream.next())
                .await
                .expect("timed out")
                .expect("stream ended")
                .expect("ws error");
            if let WsMessage::Text(text) = msg {
                return text;
            }
        }
    }

    #[tokio::test]
    async fn test_room_fan_out_over_websocket() {
        let state = RelayState::new(RelayConfig {
            port: 0,
            max_frame_len: 32,
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = app(state.clone());
        tokio::spawn(async move { axum::serve(listener, router).await });

        let url = format!("ws://{}/ws/room1", addr);
        let (mut alice, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
        assert_eq!(
            next_text(&mut alice).await,
            r#"{"_control":"online","count":1}"#
        );

        let (mut bob, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
        assert_eq!(
            next_text(&mut alice).await,
            r#"{"_control":"online","count":2}"#
        );
        assert_eq!(
            next_text(&mut bob).await,
            r#"{"_control":"online","count":2}"#
        );

        // Oversized frame is dropped, the next one goes through.
        alice
            .send(WsMessage::Text("x".repeat(33)))
            .await
            .unwrap();
        alice
            .send(WsMessage::Text(r#"{"iv":"a","ct":"b"}"#.into()))
            .await
            .unwrap();
        assert_eq!(next_text(&mut bob).await, r#"{"iv":"a","ct":"b"}"#);

        bob.close(None).await.unwrap();
        assert_eq!(
            next_text(&mut alice).await,
            r#"{"_control":"online","count":1}"#
        );
        assert_eq!(state.frames_dropped(), 1);
    }
}
