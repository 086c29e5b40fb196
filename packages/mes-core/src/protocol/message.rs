//! Inner (decrypted) chat messages.
//!
//! ## Wire Shape
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  common:  { id, kind, sender, nick, ts, ... }                          │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  text   → { text }                                                     │
//! │  image  → { name, mime, size, data }        data = base64url           │
//! │  file   → { name, mime, size, data }                                   │
//! │  audio  → { name, mime, size, data }                                   │
//! │  chunk  → { fileId, seq, total, meta: {name, mime, size, kind}, data } │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every chunk carries the full `meta`, so any chunk may open a transfer.

use serde::{Deserialize, Serialize};

use super::codec::base64url;
use crate::error::{Error, Result};

/// Payload kinds a transfer can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    /// UTF-8 text
    Text,
    /// Image, rendered inline by clients
    Image,
    /// Arbitrary file
    File,
    /// Voice recording
    Audio,
}

impl PayloadKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Text => "text",
            PayloadKind::Image => "image",
            PayloadKind::File => "file",
            PayloadKind::Audio => "audio",
        }
    }
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable descriptor of a transfer, repeated on every chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMeta {
    /// Display or file name
    pub name: String,
    /// MIME type
    pub mime: String,
    /// Total payload size in bytes
    pub size: u64,
    /// What the reassembled bytes represent
    pub kind: PayloadKind,
}

/// A whole attachment sent in a single frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentBody {
    /// File name
    pub name: String,
    /// MIME type
    pub mime: String,
    /// Size in bytes as declared by the sender
    pub size: u64,
    /// Raw bytes
    #[serde(with = "base64url")]
    pub data: Vec<u8>,
}

/// One slice of a chunked transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkBody {
    /// Transfer id shared by all chunks of one payload
    #[serde(rename = "fileId")]
    pub file_id: String,
    /// 0-based slice index
    pub seq: u32,
    /// Total number of slices
    pub total: u32,
    /// Transfer descriptor
    pub meta: TransferMeta,
    /// Raw slice bytes
    #[serde(with = "base64url")]
    pub data: Vec<u8>,
}

/// Kind-specific part of an inner message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MessageBody {
    /// Plain text message
    Text {
        /// Message text
        text: String,
    },
    /// Atomic image
    Image(AttachmentBody),
    /// Atomic file
    File(AttachmentBody),
    /// Atomic voice recording
    Audio(AttachmentBody),
    /// One chunk of a larger transfer
    Chunk(ChunkBody),
}

impl MessageBody {
    /// Wire name of the `kind` tag
    pub fn kind_str(&self) -> &'static str {
        match self {
            MessageBody::Text { .. } => "text",
            MessageBody::Image(_) => "image",
            MessageBody::File(_) => "file",
            MessageBody::Audio(_) => "audio",
            MessageBody::Chunk(_) => "chunk",
        }
    }

    /// Wrap an atomic attachment under its kind tag.
    ///
    /// Text is not an attachment; use [`MessageBody::Text`].
    pub fn attachment(kind: PayloadKind, body: AttachmentBody) -> Result<Self> {
        match kind {
            PayloadKind::Image => Ok(MessageBody::Image(body)),
            PayloadKind::File => Ok(MessageBody::File(body)),
            PayloadKind::Audio => Ok(MessageBody::Audio(body)),
            PayloadKind::Text => Err(Error::Internal(
                "text payloads are not attachments".into(),
            )),
        }
    }
}

/// A decrypted inner message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEnvelope {
    /// Message id (for chunks, the id of that chunk message)
    pub id: String,
    /// Sender id of the originating session
    pub sender: String,
    /// Sender nickname
    #[serde(default)]
    pub nick: String,
    /// Unix milliseconds
    #[serde(default)]
    pub ts: i64,
    /// Kind-tagged body
    #[serde(flatten)]
    pub body: MessageBody,
}

impl ChatEnvelope {
    fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::MalformedEnvelope("message id is empty".into()));
        }
        if let MessageBody::Chunk(chunk) = &self.body {
            if chunk.file_id.is_empty() {
                return Err(Error::MalformedEnvelope("chunk without fileId".into()));
            }
            if chunk.total == 0 {
                return Err(Error::MalformedEnvelope(format!(
                    "chunk of {} declares zero units",
                    chunk.file_id
                )));
            }
            if chunk.seq >= chunk.total {
                return Err(Error::MalformedEnvelope(format!(
                    "chunk of {} has seq {} >= total {}",
                    chunk.file_id, chunk.seq, chunk.total
                )));
            }
        }
        Ok(())
    }
}

/// Serialize an inner message to the JSON bytes that get encrypted
pub fn encode_message(message: &ChatEnvelope) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(message)?)
}

/// Parse and validate a decrypted inner message
pub fn decode_message(bytes: &[u8]) -> Result<ChatEnvelope> {
    let message: ChatEnvelope = serde_json::from_slice(bytes)
        .map_err(|e| Error::MalformedEnvelope(format!("invalid message: {}", e)))?;
    message.validate()?;
    Ok(message)
}
