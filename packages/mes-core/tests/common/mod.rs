//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use mes_core::crypto::KEY_SIZE;
use mes_core::{
    ConnectionState, Profile, Result, SessionEvent, SessionKey, TransferConfig, TransferSession,
    Transport,
};

pub const ROOM: &str = "Ab3dE6gH9jK2";
pub const KEY_BYTES: [u8; KEY_SIZE] = [0x5A; KEY_SIZE];

pub fn key() -> SessionKey {
    SessionKey::from_bytes(KEY_BYTES)
}

/// Transport that records outbound frames instead of sending them.
#[derive(Default)]
pub struct MemoryTransport {
    frames: Mutex<Vec<String>>,
    offline: AtomicBool,
    pub ready_calls: AtomicUsize,
}

impl MemoryTransport {
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.frames.lock())
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, frame: String) -> Result<()> {
        self.frames.lock().push(frame);
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        if self.offline.load(Ordering::SeqCst) {
            ConnectionState::Connecting
        } else {
            ConnectionState::Open
        }
    }

    async fn ready(&self) -> Result<()> {
        self.ready_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Peer {
    pub session: TransferSession,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub transport: Arc<MemoryTransport>,
}

pub fn peer(sender_id: &str, config: TransferConfig) -> Peer {
    let transport = Arc::new(MemoryTransport::default());
    let (session, events) = TransferSession::open(
        ROOM,
        key(),
        transport.clone(),
        Profile::new(sender_id, sender_id),
        config,
    )
    .expect("session opens");
    Peer {
        session,
        events,
        transport,
    }
}

pub fn drain(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

/// Deterministic pseudo-random bytes.
pub fn payload(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x9E37_79B9;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state & 0xFF) as u8
        })
        .collect()
}
