//! Server state management.
//!
//! Tracks room membership. Each room maps connection ids to the outbound
//! channel of that connection's sender task. All data structures are
//! concurrent (DashMap) for lock-free access.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::protocol::ControlMessage;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 10000;

/// Largest frame forwarded, in characters (text) or bytes (binary).
pub const DEFAULT_MAX_FRAME_LEN: usize = 1_600_000;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub port: u16,
    pub max_frame_len: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

/// A connected client's sender channel.
pub type ConnSender = mpsc::UnboundedSender<Message>;

/// Members of one room, keyed by connection id.
pub type Room = DashMap<String, ConnSender>;

/// Shared server state.
#[derive(Clone)]
pub struct RelayState {
    /// Room ID → members.
    /// Rooms are created on first join and removed when the last member leaves.
    pub rooms: Arc<DashMap<String, Room>>,

    /// Server configuration.
    pub config: RelayConfig,

    relayed: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

impl RelayState {
    /// Create a new relay state with the given configuration.
    pub fn new(config: RelayConfig) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            config,
            relayed: Arc::new(AtomicU64::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    // ── Membership ────────────────────────────────────────────────────────

    /// Add a connection to a room. Returns the new member count.
    pub fn join(&self, room_id: &str, conn_id: &str, sender: ConnSender) -> usize {
        let room = self.rooms.entry(room_id.to_string()).or_default();
        room.insert(conn_id.to_string(), sender);
        let count = room.len();
        tracing::debug!(room = room_id, conn = conn_id, members = count, "Joined room");
        count
    }

    /// Remove a connection from a room. Returns the remaining member count;
    /// an emptied room is dropped.
    pub fn leave(&self, room_id: &str, conn_id: &str) -> usize {
        let remaining = match self.rooms.get(room_id) {
            Some(room) => {
                room.remove(conn_id);
                room.len()
            }
            None => return 0,
        };

        if remaining == 0 {
            self.rooms.remove_if(room_id, |_, room| room.is_empty());
            tracing::debug!(room = room_id, "Room emptied");
        }
        remaining
    }

    /// Number of members currently in a room.
    pub fn member_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map(|room| room.len()).unwrap_or(0)
    }

    // ── Fan-out ───────────────────────────────────────────────────────────

    /// Forward a frame to every member of the room except `from`.
    ///
    /// Frames longer than `max_frame_len` are dropped. Members whose channel
    /// is closed are removed. Returns the number of members the frame was
    /// queued for.
    pub fn relay(&self, room_id: &str, from: &str, frame: Message, len: usize) -> usize {
        if len > self.config.max_frame_len {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                room = room_id,
                conn = from,
                len = len,
                limit = self.config.max_frame_len,
                "Dropping oversized frame"
            );
            return 0;
        }

        let delivered = self.fan_out(room_id, Some(from), &frame);
        self.relayed.fetch_add(1, Ordering::Relaxed);
        delivered
    }

    /// Announce the room's member count to all of its members.
    pub fn broadcast_presence(&self, room_id: &str) {
        let count = self.member_count(room_id);
        if count == 0 {
            return;
        }
        let text = match (ControlMessage::Online { count }).to_text() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(room = room_id, error = %e, "Could not encode presence");
                return;
            }
        };
        self.fan_out(room_id, None, &Message::Text(text));

        // Dead members removed during the fan-out change the count.
        let after = self.member_count(room_id);
        if after != count && after > 0 {
            self.broadcast_presence(room_id);
        }
    }

    fn fan_out(&self, room_id: &str, skip: Option<&str>, frame: &Message) -> usize {
        let dead: Vec<String>;
        let mut delivered = 0;
        {
            let Some(room) = self.rooms.get(room_id) else {
                return 0;
            };
            dead = room
                .iter()
                .filter(|member| Some(member.key().as_str()) != skip)
                .filter_map(|member| match member.value().send(frame.clone()) {
                    Ok(()) => {
                        delivered += 1;
                        None
                    }
                    Err(_) => Some(member.key().clone()),
                })
                .collect();
        }

        for conn_id in dead {
            tracing::debug!(room = room_id, conn = conn_id.as_str(), "Removing dead member");
            self.leave(room_id, &conn_id);
        }
        delivered
    }

    // ── Stats ─────────────────────────────────────────────────────────────

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of connections across all rooms.
    pub fn connection_count(&self) -> usize {
        self.rooms.iter().map(|room| room.len()).sum()
    }

    /// Frames forwarded since start.
    pub fn frames_relayed(&self) -> u64 {
        self.relayed.load(Ordering::Relaxed)
    }

    /// Oversized frames dropped since start.
    pub fn frames_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
