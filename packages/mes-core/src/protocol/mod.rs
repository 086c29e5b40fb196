//! # Framing Codec
//!
//! Two layers of framing sit between a payload and the relay:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         FRAME LAYERS                                    │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ChatEnvelope (inner)          {id, kind, sender, nick, ts, ...}       │
//! │        │ encode_message                                                 │
//! │        ▼                                                                │
//! │  JSON bytes ── crypto::encrypt ──► SealedFrame {nonce, ciphertext}     │
//! │                                          │ encode_frame                 │
//! │                                          ▼                              │
//! │  WireFrame (outer)             {"iv": "...", "ct": "..."}              │
//! │                                {"_control": "online", "count": N}      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Decoding runs the same path backwards. Every structural problem surfaces
//! as `Error::MalformedEnvelope` so callers can log and skip the frame.

mod codec;
mod envelope;
mod message;

pub use codec::{decode_bytes, decoded_capacity, encode_bytes, encoded_len};
pub use envelope::{decode_frame, encode_frame, ControlFrame, SealedFrame, WireFrame};
pub use message::{
    decode_message, encode_message, AttachmentBody, ChatEnvelope, ChunkBody, MessageBody,
    PayloadKind, TransferMeta,
};
