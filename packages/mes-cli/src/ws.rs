//! WebSocket transport to the relay.
//!
//! A background task owns the socket. It connects to `{relay}/ws/{room}`,
//! pumps outbound frames from an unbounded queue, hands inbound text frames
//! to the caller's channel, and reconnects after a fixed delay when the
//! connection drops.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use mes_core::{ConnectionState, Error, Result, Transport};

/// Queued outbound frames above which `ready()` waits.
const HIGH_WATER: usize = 4;

const DRAIN_POLL: Duration = Duration::from_millis(10);

/// Relay URL for a room.
pub fn room_url(relay: &str, room: &str) -> String {
    format!("{}/ws/{}", relay.trim_end_matches('/'), room)
}

/// Outbound queue of one connection and its count of unsent frames.
#[derive(Clone)]
struct Outbound {
    tx: mpsc::UnboundedSender<String>,
    pending: Arc<AtomicUsize>,
}

impl Outbound {
    fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            tx,
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn queue(&self, frame: String) -> Result<()> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.tx.send(frame).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            Error::Transport("relay connection closed".into())
        })
    }
}

pub struct WsTransport {
    url: String,
    state: Mutex<ConnectionState>,
    outbound: Mutex<Option<Outbound>>,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            url: url.into(),
            state: Mutex::new(ConnectionState::Connecting),
            outbound: Mutex::new(None),
        })
    }

    /// Frames queued on the current connection and not yet written.
    fn pending(&self) -> usize {
        self.outbound
            .lock()
            .as_ref()
            .map_or(0, |outbound| outbound.pending.load(Ordering::SeqCst))
    }

    /// Start the connection loop. Inbound text frames go to `inbound`; the
    /// loop ends, leaving the transport `Closed`, once `inbound` is closed.
    pub fn spawn(
        self: &Arc<Self>,
        reconnect: Duration,
        inbound: mpsc::UnboundedSender<String>,
    ) -> JoinHandle<()> {
        let transport = Arc::clone(self);
        tokio::spawn(async move { transport.run(reconnect, inbound).await })
    }

    async fn run(&self, reconnect: Duration, inbound: mpsc::UnboundedSender<String>) {
        loop {
            self.set_state(ConnectionState::Connecting);
            tracing::info!(url = self.url.as_str(), "Connecting to relay...");

            match self.connect_once(&inbound).await {
                Ok(()) => tracing::info!("Relay connection closed"),
                Err(e) => tracing::warn!(error = %e, "Relay connection failed"),
            }

            self.outbound.lock().take();

            if inbound.is_closed() {
                self.set_state(ConnectionState::Closed);
                break;
            }
            self.set_state(ConnectionState::Connecting);
            tracing::info!(
                reconnect_secs = reconnect.as_secs(),
                "Reconnecting to relay after delay..."
            );
            tokio::time::sleep(reconnect).await;
        }
    }

    async fn connect_once(
        &self,
        inbound: &mpsc::UnboundedSender<String>,
    ) -> std::result::Result<(), tokio_tungstenite::tungstenite::Error> {
        let (ws_stream, _) = connect_async(&self.url).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let outbound = Outbound::new(tx);
        let pending = Arc::clone(&outbound.pending);
        *self.outbound.lock() = Some(outbound);
        self.set_state(ConnectionState::Open);
        tracing::info!("Connected to relay");

        loop {
            tokio::select! {
                Some(frame) = rx.recv() => {
                    ws_sender.send(WsMessage::Text(frame)).await?;
                    pending.fetch_sub(1, Ordering::SeqCst);
                }
                msg = ws_receiver.next() => match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        if inbound.send(text).is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(e)) => return Err(e),
                    _ => {} // Binary, Ping, Pong
                },
            }
        }

        let _ = ws_sender.close().await;
        Ok(())
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, frame: String) -> Result<()> {
        let outbound = self.outbound.lock().clone();
        match outbound {
            Some(outbound) => outbound.queue(frame),
            None => Err(Error::TransportUnavailable),
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    async fn ready(&self) -> Result<()> {
        while self.pending() > HIGH_WATER {
            if !self.state().is_open() {
                return Err(Error::TransportUnavailable);
            }
            tokio::time::sleep(DRAIN_POLL).await;
        }
        Ok(())
    }
}
