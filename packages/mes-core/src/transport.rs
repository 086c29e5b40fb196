//! Transport seam between the transfer session and the relay connection.
//!
//! The core treats the transport as an unreliable, per-connection ordered
//! channel of text frames. Connection management (dialing, reconnecting,
//! reading inbound frames) belongs to the implementation; inbound frames are
//! fed to [`TransferSession::on_frame`](crate::transfer::TransferSession::on_frame).

use async_trait::async_trait;

use crate::error::Result;

/// Connection state as seen by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Dialing or waiting to reconnect
    Connecting,
    /// Frames can be sent
    Open,
    /// Shut down for good
    Closed,
}

impl ConnectionState {
    /// Whether frames can be sent right now
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

/// An outbound frame channel to the room
#[async_trait]
pub trait Transport: Send + Sync {
    /// Hand one encoded frame to the connection.
    async fn send(&self, frame: String) -> Result<()>;

    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Resolve once the connection can take more frames.
    ///
    /// Chunked sends await this periodically. Transports without
    /// backpressure keep the default.
    async fn ready(&self) -> Result<()> {
        Ok(())
    }
}
