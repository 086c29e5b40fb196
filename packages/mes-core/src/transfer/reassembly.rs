//! # Chunk Reassembly
//!
//! Collects the chunks of inbound transfers and emits each completed payload
//! exactly once.
//!
//! ## Transfer State Machine
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    PER-TRANSFER STATE MACHINE                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   ┌─────────┐  first chunk   ┌────────────┐  last missing  ┌──────────┐ │
//! │   │  Empty  │───────────────►│ Assembling │───────────────►│ Complete │ │
//! │   │(no buf) │                │ 0<recv<tot │     slot       │(buf gone)│ │
//! │   └─────────┘                └─────┬──────┘                └────┬─────┘ │
//! │        ▲                           │ ▲                          │       │
//! │        │   purge_stale(age)        │ │ new slot / duplicate     │       │
//! │        └───────────────────────────┘ └─────────┘                │       │
//! │                                                                  │       │
//! │   late chunks for a completed id ──► AlreadyCompleted ◄─────────┘       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Slots are index-addressed, so arrival order never matters. A duplicate
//! overwrites its slot without advancing the received count.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use super::events::{ChatMessage, MessageContent, TransferDirection, TransferProgress};
use crate::error::{Error, Result};
use crate::protocol::{ChunkBody, PayloadKind, TransferMeta};

/// Upper bound on units per transfer (16 GiB at the default unit size)
pub const MAX_TRANSFER_UNITS: u32 = 1 << 16;

/// Default number of completed transfer ids remembered
pub const DEFAULT_COMPLETED_MEMORY: usize = 1024;

/// A decoded chunk plus the provenance of the message that carried it
#[derive(Debug, Clone)]
pub struct ChunkFrame {
    /// Sender id
    pub sender: String,
    /// Sender nickname
    pub nick: String,
    /// Unix milliseconds
    pub ts: i64,
    /// The chunk itself
    pub chunk: ChunkBody,
}

/// Result of feeding one chunk to the [`Reassembler`]
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    /// New slot filled, transfer still incomplete
    Assembling {
        /// Transfer id
        transfer_id: String,
        /// Distinct slots filled
        received: u32,
        /// Total slots
        total: u32,
    },
    /// Slot was already filled; count unchanged
    Duplicate {
        /// Transfer id
        transfer_id: String,
        /// Distinct slots filled
        received: u32,
        /// Total slots
        total: u32,
    },
    /// Last slot filled; the payload is delivered and the buffer dropped
    Completed(ChatMessage),
    /// Chunk for a transfer that already completed
    AlreadyCompleted {
        /// Transfer id
        transfer_id: String,
    },
}

// ============================================================================
// REASSEMBLY BUFFER
// ============================================================================

struct ReassemblyBuffer {
    meta: TransferMeta,
    total: u32,
    sender: String,
    nick: String,
    ts: i64,
    slots: Vec<Option<Vec<u8>>>,
    received: u32,
    last_update: Instant,
}

impl ReassemblyBuffer {
    fn new(frame: &ChunkFrame, now: Instant) -> Self {
        Self {
            meta: frame.chunk.meta.clone(),
            total: frame.chunk.total,
            sender: frame.sender.clone(),
            nick: frame.nick.clone(),
            ts: frame.ts,
            slots: vec![None; frame.chunk.total as usize],
            received: 0,
            last_update: now,
        }
    }

    fn check_consistent(&self, chunk: &ChunkBody) -> Result<()> {
        if chunk.total != self.total {
            return Err(Error::MalformedEnvelope(format!(
                "chunk of {} declares {} units, transfer has {}",
                chunk.file_id, chunk.total, self.total
            )));
        }
        if chunk.meta != self.meta {
            return Err(Error::MalformedEnvelope(format!(
                "chunk of {} carries different meta",
                chunk.file_id
            )));
        }
        Ok(())
    }

    /// Store a slice. Returns `true` when the slot was previously empty.
    fn insert(&mut self, seq: u32, data: Vec<u8>, now: Instant) -> bool {
        let slot = &mut self.slots[seq as usize];
        let fresh = slot.is_none();
        *slot = Some(data);
        if fresh {
            self.received += 1;
        }
        self.last_update = now;

        debug_assert_eq!(
            self.received as usize,
            self.slots.iter().filter(|s| s.is_some()).count()
        );
        fresh
    }

    fn is_complete(&self) -> bool {
        self.received == self.total
    }

    /// Concatenate slots in index order and decode per `meta.kind`.
    fn assemble(self, transfer_id: String) -> Result<ChatMessage> {
        let len: usize = self.slots.iter().flatten().map(Vec::len).sum();
        if len as u64 != self.meta.size {
            return Err(Error::MalformedEnvelope(format!(
                "transfer {} reassembled to {} bytes, meta declares {}",
                transfer_id, len, self.meta.size
            )));
        }

        let mut bytes = Vec::with_capacity(len);
        for (seq, slot) in self.slots.into_iter().enumerate() {
            let slice = slot.ok_or_else(|| {
                Error::Internal(format!("slot {} of {} empty at completion", seq, transfer_id))
            })?;
            bytes.extend_from_slice(&slice);
        }

        let content = match self.meta.kind {
            PayloadKind::Text => MessageContent::Text(String::from_utf8(bytes).map_err(|_| {
                Error::MalformedEnvelope(format!("text transfer {} is not UTF-8", transfer_id))
            })?),
            PayloadKind::Image | PayloadKind::File | PayloadKind::Audio => {
                MessageContent::Attachment {
                    meta: self.meta,
                    data: bytes,
                }
            }
        };

        Ok(ChatMessage {
            id: transfer_id,
            sender: self.sender,
            nick: self.nick,
            ts: self.ts,
            content,
        })
    }
}

// ============================================================================
// REASSEMBLER
// ============================================================================

/// Table of in-flight inbound transfers keyed by transfer id
pub struct Reassembler {
    buffers: HashMap<String, ReassemblyBuffer>,
    completed: HashSet<String>,
    completed_order: VecDeque<(String, Instant)>,
    completed_memory: usize,
}

impl Reassembler {
    /// Create an empty reassembler remembering up to `completed_memory`
    /// finished transfer ids
    pub fn new(completed_memory: usize) -> Self {
        Self {
            buffers: HashMap::new(),
            completed: HashSet::new(),
            completed_order: VecDeque::new(),
            completed_memory,
        }
    }

    /// Feed one chunk.
    ///
    /// ## Errors
    ///
    /// `MalformedEnvelope` for an out-of-range `seq`, a `total` or `meta`
    /// that disagrees with the first chunk of the transfer, or a completed
    /// payload that fails its size or UTF-8 check. A rejected chunk leaves
    /// the transfer's buffer untouched.
    pub fn accept(&mut self, frame: ChunkFrame) -> Result<ChunkOutcome> {
        let now = Instant::now();
        let chunk = &frame.chunk;

        if chunk.total == 0 || chunk.total > MAX_TRANSFER_UNITS {
            return Err(Error::MalformedEnvelope(format!(
                "chunk of {} declares {} units",
                chunk.file_id, chunk.total
            )));
        }
        if chunk.seq >= chunk.total {
            return Err(Error::MalformedEnvelope(format!(
                "chunk of {} has seq {} >= total {}",
                chunk.file_id, chunk.seq, chunk.total
            )));
        }

        if self.completed.contains(&chunk.file_id) {
            return Ok(ChunkOutcome::AlreadyCompleted {
                transfer_id: frame.chunk.file_id,
            });
        }

        if let Some(buffer) = self.buffers.get(&chunk.file_id) {
            buffer.check_consistent(chunk)?;
        } else {
            tracing::debug!(
                transfer_id = %chunk.file_id,
                total = chunk.total,
                kind = %chunk.meta.kind,
                "Opening reassembly buffer"
            );
            let buffer = ReassemblyBuffer::new(&frame, now);
            self.buffers.insert(chunk.file_id.clone(), buffer);
        }

        let ChunkFrame { chunk, .. } = frame;
        let transfer_id = chunk.file_id;
        let buffer = self
            .buffers
            .get_mut(&transfer_id)
            .ok_or_else(|| Error::Internal(format!("buffer for {} vanished", transfer_id)))?;

        let fresh = buffer.insert(chunk.seq, chunk.data, now);
        let (received, total) = (buffer.received, buffer.total);

        if !fresh {
            return Ok(ChunkOutcome::Duplicate {
                transfer_id,
                received,
                total,
            });
        }
        if !buffer.is_complete() {
            return Ok(ChunkOutcome::Assembling {
                transfer_id,
                received,
                total,
            });
        }

        let buffer = self
            .buffers
            .remove(&transfer_id)
            .ok_or_else(|| Error::Internal(format!("buffer for {} vanished", transfer_id)))?;
        self.remember_completed(transfer_id.clone(), now);

        let message = buffer.assemble(transfer_id)?;
        tracing::info!(
            transfer_id = %message.id,
            kind = %message.kind(),
            units = total,
            "Transfer reassembled"
        );
        Ok(ChunkOutcome::Completed(message))
    }

    fn remember_completed(&mut self, transfer_id: String, now: Instant) {
        if self.completed_memory == 0 {
            return;
        }
        if self.completed.insert(transfer_id.clone()) {
            self.completed_order.push_back((transfer_id, now));
        }
        while self.completed_order.len() > self.completed_memory {
            if let Some((old, _)) = self.completed_order.pop_front() {
                self.completed.remove(&old);
            }
        }
    }

    /// Drop incomplete buffers idle for at least `older_than`.
    ///
    /// Completed ids older than `older_than` are forgotten as well. Returns
    /// the ids of the dropped incomplete transfers.
    pub fn purge_stale(&mut self, older_than: Duration) -> Vec<String> {
        let now = Instant::now();
        let is_stale = |at: Instant| now.saturating_duration_since(at) >= older_than;

        let stale: Vec<String> = self
            .buffers
            .iter()
            .filter(|(_, buffer)| is_stale(buffer.last_update))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            self.buffers.remove(id);
        }

        while let Some((_, at)) = self.completed_order.front() {
            if !is_stale(*at) {
                break;
            }
            if let Some((old, _)) = self.completed_order.pop_front() {
                self.completed.remove(&old);
            }
        }

        stale
    }

    /// Drop every buffer and forget completed ids. Returns how many
    /// incomplete transfers were discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.buffers.len();
        self.buffers.clear();
        self.completed.clear();
        self.completed_order.clear();
        dropped
    }

    /// Number of incomplete transfers held
    pub fn in_flight(&self) -> usize {
        self.buffers.len()
    }

    /// Progress of an incomplete transfer
    pub fn progress(&self, transfer_id: &str) -> Option<TransferProgress> {
        self.buffers.get(transfer_id).map(|buffer| {
            TransferProgress::new(
                transfer_id,
                TransferDirection::Inbound,
                buffer.received,
                buffer.total,
            )
        })
    }

    /// Whether `transfer_id` completed and is still remembered
    pub fn is_completed(&self, transfer_id: &str) -> bool {
        self.completed.contains(transfer_id)
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(DEFAULT_COMPLETED_MEMORY)
    }
}

// ============================================================================
// TESTS
// ============================================================================
