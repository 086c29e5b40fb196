//! Events and delivered messages emitted by a [`TransferSession`](super::TransferSession).

use crate::protocol::{AttachmentBody, ChatEnvelope, MessageBody, PayloadKind, TransferMeta};

// ============================================================================
// DELIVERED MESSAGES
// ============================================================================

/// A fully materialized chat message, as handed to the sink.
///
/// Identical in shape whether it arrived atomically or was reassembled
/// from chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Message id (the transfer id for chunked payloads)
    pub id: String,
    /// Sender id
    pub sender: String,
    /// Sender nickname
    pub nick: String,
    /// Unix milliseconds
    pub ts: i64,
    /// Payload
    pub content: MessageContent,
}

/// Payload of a delivered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    /// Text message
    Text(String),
    /// Image, file or voice recording
    Attachment {
        /// Transfer descriptor
        meta: TransferMeta,
        /// Raw bytes
        data: Vec<u8>,
    },
}

impl ChatMessage {
    /// Payload kind of the message
    pub fn kind(&self) -> PayloadKind {
        match &self.content {
            MessageContent::Text(_) => PayloadKind::Text,
            MessageContent::Attachment { meta, .. } => meta.kind,
        }
    }

    /// Materialize an atomic envelope. Chunks yield `None`.
    pub fn from_atomic(envelope: ChatEnvelope) -> Option<Self> {
        let content = match envelope.body {
            MessageBody::Text { text } => MessageContent::Text(text),
            MessageBody::Image(body) => attachment(PayloadKind::Image, body),
            MessageBody::File(body) => attachment(PayloadKind::File, body),
            MessageBody::Audio(body) => attachment(PayloadKind::Audio, body),
            MessageBody::Chunk(_) => return None,
        };
        Some(Self {
            id: envelope.id,
            sender: envelope.sender,
            nick: envelope.nick,
            ts: envelope.ts,
            content,
        })
    }
}

fn attachment(kind: PayloadKind, body: AttachmentBody) -> MessageContent {
    MessageContent::Attachment {
        meta: TransferMeta {
            name: body.name,
            mime: body.mime,
            size: body.size,
            kind,
        },
        data: body.data,
    }
}

// ============================================================================
// SESSION EVENTS
// ============================================================================

/// Where a delivered message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    /// Sent by this session
    Local,
    /// Received from another room member
    Remote,
}

/// Direction of a transfer relative to us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// We are sending
    Outbound,
    /// We are receiving
    Inbound,
}

/// Progress of one transfer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferProgress {
    /// Transfer id
    pub transfer_id: String,
    /// Upload or download
    pub direction: TransferDirection,
    /// Units handed to the transport (outbound) or received (inbound)
    pub done: u32,
    /// Total units
    pub total: u32,
    /// `done / total`, exactly 1.0 when complete
    pub fraction: f64,
}

impl TransferProgress {
    /// Build a progress report
    pub fn new(transfer_id: &str, direction: TransferDirection, done: u32, total: u32) -> Self {
        let fraction = if total == 0 {
            1.0
        } else {
            f64::from(done) / f64::from(total)
        };
        Self {
            transfer_id: transfer_id.to_string(),
            direction,
            done,
            total,
            fraction,
        }
    }

    /// Whether every unit is accounted for
    pub fn is_complete(&self) -> bool {
        self.done >= self.total
    }
}

/// Events emitted to the application layer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A message to append to history
    Message {
        /// The message
        message: ChatMessage,
        /// Sent by us or received
        origin: MessageOrigin,
    },
    /// Room member count changed
    Presence {
        /// Number of connections in the room
        count: u32,
    },
    /// An inbound transfer advanced
    Progress(TransferProgress),
    /// User-visible notice (e.g. not connected)
    Notice(String),
}
