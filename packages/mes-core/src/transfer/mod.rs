//! # Transfer Module
//!
//! Chunking, reassembly and the per-room session that drives them.
//!
//! ## Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`chunking`] | Split payloads into bounded units; frame size accounting |
//! | [`reassembly`] | Per-transfer slot table; exactly-once completion |
//! | [`session`] | Send/receive orchestration, pacing, presence, events |
//! | [`events`] | Delivered messages, progress and session events |

pub mod chunking;
pub mod events;
pub mod reassembly;
pub mod session;

pub use chunking::{
    estimated_frame_len, is_atomic, max_unit_for_frame, split, unit_count, DEFAULT_MAX_FRAME_LEN,
    DEFAULT_UNIT_SIZE,
};
pub use events::{
    ChatMessage, MessageContent, MessageOrigin, SessionEvent, TransferDirection, TransferProgress,
};
pub use reassembly::{ChunkFrame, ChunkOutcome, Reassembler, MAX_TRANSFER_UNITS};
pub use session::{normalize_nickname, Profile, Received, TransferSession, MAX_NICK_CHARS};
