//! # Transfer Session
//!
//! One session per joined room. Owns the session key, the reassembly table
//! and the presence counter, and drives both directions of the protocol.
//!
//! ## Send Path
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  send_text / send_attachment                                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  len <= unit_size, or text that fits one frame ?                       │
//! │     │yes                               │no                              │
//! │     ▼                                  ▼                                │
//! │  one text/image/file/audio msg      split → N chunk msgs (meta on each)│
//! │     │                                  │  for each unit, in order:      │
//! │     │                                  │   encrypt (fresh nonce)        │
//! │     │                                  │   size check → transport.send  │
//! │     │                                  │   progress(seq+1 / N)          │
//! │     │                                  │   yield; every pace_every:     │
//! │     │                                  │     await ready() + pace_delay │
//! │     ▼                                  ▼                                │
//! │  progress(1.0)                      SessionEvent::Message { Local }    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Receive Path
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  frame ─► decode_frame ─┬─ Control(Online) ─► presence counter          │
//! │                         └─ Sealed ─► decrypt ─► decode_message          │
//! │                                         │                               │
//! │                    sender == us? ─► ignored (echo)                      │
//! │                                         │                               │
//! │                    atomic ──────────────┼──► Message { Remote }         │
//! │                    chunk ─► Reassembler ┴──► Progress … Message         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The reassembly lock is only held for synchronous slot updates, so an
//! outbound chunk loop never blocks inbound processing.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::chunking::{is_atomic, split};
use super::events::{
    ChatMessage, MessageContent, MessageOrigin, SessionEvent, TransferDirection, TransferProgress,
};
use super::reassembly::{ChunkFrame, ChunkOutcome, Reassembler};
use crate::config::TransferConfig;
use crate::crypto::{self, generate_sender_id, SessionKey};
use crate::error::{Error, Result};
use crate::protocol::{
    decode_frame, decode_message, encode_frame, encode_message, AttachmentBody, ChatEnvelope,
    ChunkBody, ControlFrame, MessageBody, PayloadKind, TransferMeta, WireFrame,
};
use crate::time::now_timestamp_millis;
use crate::transport::Transport;

/// Longest nickname, in characters
pub const MAX_NICK_CHARS: usize = 24;

/// Nickname used when none is given
pub const DEFAULT_NICK: &str = "anon";

/// Name given to text payloads that are too large to send atomically
const LONG_TEXT_NAME: &str = "message.txt";

// ============================================================================
// PROFILE
// ============================================================================

/// Who we are in the room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    sender_id: String,
    nickname: String,
}

impl Profile {
    /// Create a profile; the nickname is normalized
    pub fn new(sender_id: impl Into<String>, nickname: &str) -> Self {
        Self {
            sender_id: sender_id.into(),
            nickname: normalize_nickname(nickname),
        }
    }

    /// Create a profile with a fresh random sender id
    pub fn generate(nickname: &str) -> Self {
        Self::new(generate_sender_id(), nickname)
    }

    /// Sender id stamped on every outbound message
    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    /// Display nickname
    pub fn nickname(&self) -> &str {
        &self.nickname
    }
}

/// Trim and cap a nickname, falling back to [`DEFAULT_NICK`]
pub fn normalize_nickname(nickname: &str) -> String {
    let nick: String = nickname.trim().chars().take(MAX_NICK_CHARS).collect();
    if nick.is_empty() {
        DEFAULT_NICK.to_string()
    } else {
        nick
    }
}

// ============================================================================
// RECEIVE RESULT
// ============================================================================

/// What an inbound frame amounted to
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    /// Presence update from the relay
    Presence(u32),
    /// A complete message (atomic, or the last chunk of a transfer)
    Message(ChatMessage),
    /// A chunk advanced an inbound transfer
    Assembling(TransferProgress),
    /// A chunk that was already held
    Duplicate {
        /// Transfer id
        transfer_id: String,
    },
    /// A chunk of a transfer that already completed
    AlreadyCompleted {
        /// Transfer id
        transfer_id: String,
    },
    /// Our own frame reflected back
    Echo,
}

// ============================================================================
// TRANSFER SESSION
// ============================================================================

/// An open room: key, transport, reassembly table and presence
pub struct TransferSession {
    room: String,
    key: SessionKey,
    transport: Arc<dyn Transport>,
    profile: Profile,
    config: TransferConfig,
    reassembler: Mutex<Reassembler>,
    online: AtomicU32,
    closed: AtomicBool,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl TransferSession {
    /// Open a session for `room`.
    ///
    /// Returns the session and the receiver of its [`SessionEvent`]s.
    pub fn open(
        room: impl Into<String>,
        key: SessionKey,
        transport: Arc<dyn Transport>,
        profile: Profile,
        config: TransferConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>)> {
        let room = room.into();
        if room.is_empty() {
            return Err(Error::InvalidConfig("room id is empty".into()));
        }
        config.validate()?;

        let (events, rx) = mpsc::unbounded_channel();
        tracing::info!(
            room = %room,
            sender = %profile.sender_id(),
            unit_size = config.unit_size,
            "Transfer session opened"
        );

        let session = Self {
            room,
            key,
            transport,
            profile,
            reassembler: Mutex::new(Reassembler::new(config.completed_memory)),
            config,
            online: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            events,
        };
        Ok((session, rx))
    }

    /// Close the session and drop all incomplete inbound transfers.
    ///
    /// Later sends and receives fail with `SessionClosed`.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let dropped = self.reassembler.lock().clear();
        tracing::info!(room = %self.room, dropped, "Transfer session closed");
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Room id
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Our profile
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Active configuration
    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Last presence count reported by the relay
    pub fn online_count(&self) -> u32 {
        self.online.load(Ordering::SeqCst)
    }

    /// Number of incomplete inbound transfers
    pub fn in_flight(&self) -> usize {
        self.reassembler.lock().in_flight()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.transport.state().is_open() {
            return Ok(());
        }
        self.emit(SessionEvent::Notice("Not connected to the relay.".into()));
        Err(Error::TransportUnavailable)
    }

    fn emit(&self, event: SessionEvent) {
        // The application may have dropped the receiver; events are best effort.
        let _ = self.events.send(event);
    }

    // ------------------------------------------------------------------------
    // Send path
    // ------------------------------------------------------------------------

    /// Send a text message, chunking it when it exceeds one unit
    pub async fn send_text(&self, text: &str) -> Result<ChatMessage> {
        let meta = TransferMeta {
            name: LONG_TEXT_NAME.into(),
            mime: "text/plain".into(),
            size: text.len() as u64,
            kind: PayloadKind::Text,
        };
        self.send_payload(meta, text.as_bytes(), |_| {}).await
    }

    /// Send an image, file or voice recording.
    ///
    /// `progress` is invoked after every unit handed to the transport with a
    /// strictly increasing fraction that ends at exactly 1.0.
    pub async fn send_attachment<F>(
        &self,
        kind: PayloadKind,
        name: &str,
        mime: &str,
        bytes: &[u8],
        progress: F,
    ) -> Result<ChatMessage>
    where
        F: FnMut(&TransferProgress) + Send,
    {
        let meta = TransferMeta {
            name: name.to_string(),
            mime: mime.to_string(),
            size: bytes.len() as u64,
            kind,
        };
        self.send_payload(meta, bytes, progress).await
    }

    async fn send_payload<F>(
        &self,
        meta: TransferMeta,
        bytes: &[u8],
        mut progress: F,
    ) -> Result<ChatMessage>
    where
        F: FnMut(&TransferProgress) + Send,
    {
        self.ensure_open()?;
        self.ensure_connected()?;

        let content = match meta.kind {
            PayloadKind::Text => MessageContent::Text(
                String::from_utf8(bytes.to_vec())
                    .map_err(|_| Error::InvalidConfig("text payload is not UTF-8".into()))?,
            ),
            PayloadKind::Image | PayloadKind::File | PayloadKind::Audio => {
                MessageContent::Attachment {
                    meta: meta.clone(),
                    data: bytes.to_vec(),
                }
            }
        };

        let transfer_id = Uuid::new_v4().to_string();
        let ts = now_timestamp_millis();

        let atomic = if is_atomic(bytes.len(), self.config.unit_size) {
            let body = atomic_body(&content)?;
            Some(self.seal(&self.envelope(transfer_id.clone(), ts, body))?)
        } else if let MessageContent::Text(text) = &content {
            // Long text still goes out whole while it fits one frame.
            let body = MessageBody::Text { text: text.clone() };
            match self.seal(&self.envelope(transfer_id.clone(), ts, body)) {
                Ok(frame) => Some(frame),
                Err(Error::FrameTooLarge { .. }) => None,
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        match atomic {
            Some(frame) => {
                self.send_frame(frame).await?;
                progress(&TransferProgress::new(
                    &transfer_id,
                    TransferDirection::Outbound,
                    1,
                    1,
                ));
                tracing::debug!(transfer_id = %transfer_id, kind = %meta.kind, "Sent atomic message");
            }
            None => {
                self.send_chunked(&transfer_id, &meta, bytes, &mut progress)
                    .await?
            }
        }

        let message = ChatMessage {
            id: transfer_id,
            sender: self.profile.sender_id.clone(),
            nick: self.profile.nickname.clone(),
            ts,
            content,
        };
        self.emit(SessionEvent::Message {
            message: message.clone(),
            origin: MessageOrigin::Local,
        });
        Ok(message)
    }

    async fn send_chunked<F>(
        &self,
        transfer_id: &str,
        meta: &TransferMeta,
        bytes: &[u8],
        progress: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&TransferProgress) + Send,
    {
        let slices = split(bytes, self.config.unit_size)?;
        let total = u32::try_from(slices.len())
            .map_err(|_| Error::InvalidConfig(format!("{} units is too many", slices.len())))?;

        tracing::info!(
            transfer_id = %transfer_id,
            kind = %meta.kind,
            size = meta.size,
            units = total,
            "Starting chunked send"
        );

        for (seq, slice) in (0u32..).zip(slices) {
            self.ensure_open()?;

            let body = MessageBody::Chunk(ChunkBody {
                file_id: transfer_id.to_string(),
                seq,
                total,
                meta: meta.clone(),
                data: slice.to_vec(),
            });
            let envelope = self.envelope(Uuid::new_v4().to_string(), now_timestamp_millis(), body);
            self.send_envelope(envelope).await?;

            let sent = seq + 1;
            progress(&TransferProgress::new(
                transfer_id,
                TransferDirection::Outbound,
                sent,
                total,
            ));

            if sent < total {
                if self.config.pace_every > 0 && sent % self.config.pace_every == 0 {
                    self.transport.ready().await?;
                    if !self.config.pace_delay.is_zero() {
                        tokio::time::sleep(self.config.pace_delay).await;
                    }
                }
                tokio::task::yield_now().await;
            }
        }
        Ok(())
    }

    fn envelope(&self, id: String, ts: i64, body: MessageBody) -> ChatEnvelope {
        ChatEnvelope {
            id,
            sender: self.profile.sender_id.clone(),
            nick: self.profile.nickname.clone(),
            ts,
            body,
        }
    }

    /// Encrypt and frame an envelope, enforcing the frame ceiling.
    fn seal(&self, envelope: &ChatEnvelope) -> Result<String> {
        let plaintext = encode_message(envelope)?;
        let sealed = crypto::encrypt(&self.key, &plaintext)?;
        let frame = encode_frame(&WireFrame::Sealed(sealed));

        if frame.len() > self.config.max_frame_len {
            return Err(Error::FrameTooLarge {
                len: frame.len(),
                limit: self.config.max_frame_len,
            });
        }
        Ok(frame)
    }

    async fn send_frame(&self, frame: String) -> Result<()> {
        self.ensure_connected()?;
        self.transport.send(frame).await
    }

    async fn send_envelope(&self, envelope: ChatEnvelope) -> Result<()> {
        let frame = self.seal(&envelope)?;
        self.send_frame(frame).await
    }

    // ------------------------------------------------------------------------
    // Receive path
    // ------------------------------------------------------------------------

    /// Process one inbound frame, reporting what it amounted to.
    ///
    /// ## Errors
    ///
    /// `MalformedEnvelope` and `AuthenticationFailure` for frames that should
    /// be dropped; `SessionClosed` after [`close`](Self::close).
    pub fn receive(&self, frame: &str) -> Result<Received> {
        self.ensure_open()?;

        let sealed = match decode_frame(frame)? {
            WireFrame::Control(ControlFrame::Online { count }) => {
                self.online.store(count, Ordering::SeqCst);
                self.emit(SessionEvent::Presence { count });
                return Ok(Received::Presence(count));
            }
            WireFrame::Sealed(sealed) => sealed,
        };

        let plaintext = crypto::decrypt(&self.key, &sealed)?;
        let envelope = decode_message(&plaintext)?;

        if envelope.sender == self.profile.sender_id {
            tracing::debug!(id = %envelope.id, "Ignoring own echo");
            return Ok(Received::Echo);
        }

        let chunk_frame = match envelope.body {
            MessageBody::Chunk(chunk) => ChunkFrame {
                sender: envelope.sender,
                nick: envelope.nick,
                ts: envelope.ts,
                chunk,
            },
            _ => {
                let message = ChatMessage::from_atomic(envelope)
                    .ok_or_else(|| Error::Internal("atomic message expected".into()))?;
                tracing::debug!(id = %message.id, kind = %message.kind(), "Received message");
                self.deliver(message.clone());
                return Ok(Received::Message(message));
            }
        };

        let total = chunk_frame.chunk.total;
        let outcome = self.reassembler.lock().accept(chunk_frame)?;

        Ok(match outcome {
            ChunkOutcome::Assembling {
                transfer_id,
                received,
                total,
            } => {
                let progress = TransferProgress::new(
                    &transfer_id,
                    TransferDirection::Inbound,
                    received,
                    total,
                );
                self.emit(SessionEvent::Progress(progress.clone()));
                Received::Assembling(progress)
            }
            ChunkOutcome::Duplicate { transfer_id, .. } => {
                tracing::debug!(transfer_id = %transfer_id, "Duplicate chunk");
                Received::Duplicate { transfer_id }
            }
            ChunkOutcome::AlreadyCompleted { transfer_id } => {
                tracing::debug!(transfer_id = %transfer_id, "Chunk for completed transfer");
                Received::AlreadyCompleted { transfer_id }
            }
            ChunkOutcome::Completed(message) => {
                self.emit(SessionEvent::Progress(TransferProgress::new(
                    &message.id,
                    TransferDirection::Inbound,
                    total,
                    total,
                )));
                self.deliver(message.clone());
                Received::Message(message)
            }
        })
    }

    fn deliver(&self, message: ChatMessage) {
        self.emit(SessionEvent::Message {
            message,
            origin: MessageOrigin::Remote,
        });
    }

    /// Process one inbound frame, logging and skipping anything that fails.
    ///
    /// One bad frame never affects the frames after it.
    pub fn on_frame(&self, frame: &str) {
        match self.receive(frame) {
            Ok(_) => {}
            Err(e @ Error::AuthenticationFailure) => {
                tracing::debug!(code = e.code(), "Dropping frame that failed authentication");
            }
            Err(e) if e.is_droppable() => {
                tracing::warn!(code = e.code(), error = %e, "Dropping malformed frame");
            }
            Err(e) => {
                tracing::warn!(code = e.code(), error = %e, "Inbound frame not processed");
            }
        }
    }

    /// Purge incomplete inbound transfers idle longer than `stale_after`
    pub fn purge_stale(&self) -> Vec<String> {
        self.purge_stale_older_than(self.config.stale_after)
    }

    /// Purge incomplete inbound transfers idle for at least `older_than`
    pub fn purge_stale_older_than(&self, older_than: Duration) -> Vec<String> {
        let purged = self.reassembler.lock().purge_stale(older_than);
        if !purged.is_empty() {
            tracing::info!(room = %self.room, count = purged.len(), "Purged stale transfers");
        }
        purged
    }
}

impl Drop for TransferSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Single-message body carrying a whole payload.
fn atomic_body(content: &MessageContent) -> Result<MessageBody> {
    match content {
        MessageContent::Text(text) => Ok(MessageBody::Text { text: text.clone() }),
        MessageContent::Attachment { meta, data } => MessageBody::attachment(
            meta.kind,
            AttachmentBody {
                name: meta.name.clone(),
                mime: meta.mime.clone(),
                size: meta.size,
                data: data.clone(),
            },
        ),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KEY_SIZE;
    use crate::transport::ConnectionState;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct RecordingTransport {
        frames: Mutex<Vec<String>>,
        closed: AtomicBool,
        ready_calls: AtomicUsize,
    }

    impl RecordingTransport {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.frames.lock())
        }
    }

    #[async_trait::async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, frame: String) -> Result<()> {
            self.frames.lock().push(frame);
            Ok(())
        }

        fn state(&self) -> ConnectionState {
            if self.closed.load(Ordering::SeqCst) {
                ConnectionState::Closed
            } else {
                ConnectionState::Open
            }
        }

        async fn ready(&self) -> Result<()> {
            self.ready_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn small_config() -> TransferConfig {
        TransferConfig {
            unit_size: 16,
            pace_every: 2,
            ..TransferConfig::default()
        }
    }

    fn open(
        sender: &str,
        config: TransferConfig,
    ) -> (
        TransferSession,
        mpsc::UnboundedReceiver<SessionEvent>,
        Arc<RecordingTransport>,
    ) {
        let transport = Arc::new(RecordingTransport::default());
        let (session, rx) = TransferSession::open(
            "room12345678",
            SessionKey::from_bytes([3u8; KEY_SIZE]),
            transport.clone(),
            Profile::new(sender, sender),
            config,
        )
        .unwrap();
        (session, rx, transport)
    }

    #[test]
    fn test_normalize_nickname() {
        assert_eq!(normalize_nickname("  ann  "), "ann");
        assert_eq!(normalize_nickname("   "), "anon");
        assert_eq!(normalize_nickname(&"x".repeat(40)).chars().count(), 24);
    }

    #[tokio::test]
    async fn test_atomic_text_roundtrip() {
        let (alice, mut alice_rx, wire) = open("alice1", TransferConfig::default());
        let (bob, mut bob_rx, _) = open("bob002", TransferConfig::default());

        let sent = alice.send_text("hello").await.unwrap();
        assert!(matches!(
            alice_rx.try_recv().unwrap(),
            SessionEvent::Message { origin: MessageOrigin::Local, .. }
        ));

        let frames = wire.take();
        assert_eq!(frames.len(), 1);

        match bob.receive(&frames[0]).unwrap() {
            Received::Message(message) => {
                assert_eq!(message.content, MessageContent::Text("hello".into()));
                assert_eq!(message.id, sent.id);
                assert_eq!(message.nick, "alice1");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            bob_rx.try_recv().unwrap(),
            SessionEvent::Message { origin: MessageOrigin::Remote, .. }
        ));
    }

    #[tokio::test]
    async fn test_chunked_attachment_roundtrip() {
        let (alice, _alice_rx, wire) = open("alice1", small_config());
        let (bob, _bob_rx, _) = open("bob002", small_config());
        let payload: Vec<u8> = (0..50u8).collect();

        let mut fractions = Vec::new();
        alice
            .send_attachment(PayloadKind::File, "a.bin", "application/octet-stream", &payload, |p| {
                fractions.push(p.fraction)
            })
            .await
            .unwrap();
        assert_eq!(fractions, vec![0.25, 0.5, 0.75, 1.0]);
        // paced after unit 2; the last unit never waits
        assert_eq!(wire.ready_calls.load(Ordering::SeqCst), 1);

        let mut frames = wire.take();
        assert_eq!(frames.len(), 4);
        frames.reverse();

        let mut last = None;
        for frame in &frames {
            last = Some(bob.receive(frame).unwrap());
        }
        match last.unwrap() {
            Received::Message(message) => match message.content {
                MessageContent::Attachment { meta, data } => {
                    assert_eq!(data, payload);
                    assert_eq!(meta.size, 50);
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(bob.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_long_text_fitting_one_frame_is_atomic() {
        let (alice, _alice_rx, wire) = open("alice1", small_config());
        let (bob, _bob_rx, _) = open("bob002", small_config());
        let text = "a fairly long message that spans units";

        alice.send_text(text).await.unwrap();
        let frames = wire.take();
        assert_eq!(frames.len(), 1);

        match bob.receive(&frames[0]).unwrap() {
            Received::Message(message) => {
                assert_eq!(message.content, MessageContent::Text(text.into()));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(bob.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_text_beyond_one_frame_is_chunked() {
        let config = TransferConfig {
            unit_size: 1024,
            max_frame_len: crate::transfer::chunking::estimated_frame_len(1024).unwrap(),
            ..TransferConfig::default()
        };
        let (alice, _alice_rx, wire) = open("alice1", config.clone());
        let (bob, _bob_rx, _) = open("bob002", config);
        let text = "long line ".repeat(600);

        alice.send_text(&text).await.unwrap();
        let frames = wire.take();
        assert_eq!(frames.len(), 6);

        let received: Vec<Received> = frames.iter().map(|f| bob.receive(f).unwrap()).collect();
        assert!(matches!(received[0], Received::Assembling(_)));
        match &received[5] {
            Received::Message(message) => {
                assert_eq!(message.content, MessageContent::Text(text.clone()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_while_disconnected() {
        let (alice, mut rx, wire) = open("alice1", TransferConfig::default());
        wire.closed.store(true, Ordering::SeqCst);

        assert!(matches!(
            alice.send_text("hi").await,
            Err(Error::TransportUnavailable)
        ));
        assert!(matches!(rx.try_recv().unwrap(), SessionEvent::Notice(_)));
        assert!(wire.take().is_empty());
    }

    #[tokio::test]
    async fn test_own_echo_ignored() {
        let (alice, _rx, wire) = open("alice1", TransferConfig::default());
        alice.send_text("me").await.unwrap();
        let frames = wire.take();

        assert_eq!(alice.receive(&frames[0]).unwrap(), Received::Echo);
    }

    #[tokio::test]
    async fn test_presence_updates_counter() {
        let (alice, mut rx, _) = open("alice1", TransferConfig::default());
        assert_eq!(
            alice.receive(r#"{"_control":"online","count":2}"#).unwrap(),
            Received::Presence(2)
        );
        assert_eq!(alice.online_count(), 2);
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::Presence { count: 2 });
    }

    #[tokio::test]
    async fn test_bad_frames_are_isolated() {
        let (alice, _arx, wire) = open("alice1", TransferConfig::default());
        let (bob, mut bob_rx, _) = open("bob002", TransferConfig::default());
        alice.send_text("after the noise").await.unwrap();
        let good = wire.take().remove(0);

        bob.on_frame("garbage");
        bob.on_frame(r#"{"iv":"AQEBAQEBAQEBAQEB","ct":"AAAAAAAAAAAAAAAAAAAAAA"}"#);
        assert!(matches!(
            bob.receive("garbage"),
            Err(Error::MalformedEnvelope(_))
        ));
        bob.on_frame(&good);

        assert!(matches!(
            bob_rx.try_recv().unwrap(),
            SessionEvent::Message { origin: MessageOrigin::Remote, .. }
        ));
    }

    #[tokio::test]
    async fn test_wrong_key_is_authentication_failure() {
        let (alice, _arx, wire) = open("alice1", TransferConfig::default());
        let transport = Arc::new(RecordingTransport::default());
        let (eve, _erx) = TransferSession::open(
            "room12345678",
            SessionKey::from_bytes([4u8; KEY_SIZE]),
            transport,
            Profile::new("eve003", "eve"),
            TransferConfig::default(),
        )
        .unwrap();

        alice.send_text("secret").await.unwrap();
        let frame = wire.take().remove(0);
        assert!(matches!(
            eve.receive(&frame),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[tokio::test]
    async fn test_frame_too_large() {
        // a full unit fits, but an oversized file name does not
        let transport = Arc::new(RecordingTransport::default());
        let (alice, _rx) = TransferSession::open(
            "room12345678",
            SessionKey::from_bytes([3u8; KEY_SIZE]),
            transport,
            Profile::new("alice1", "alice"),
            TransferConfig {
                unit_size: 16,
                max_frame_len: crate::transfer::chunking::estimated_frame_len(16).unwrap(),
                ..TransferConfig::default()
            },
        )
        .unwrap();

        let name = "n".repeat(8 * 1024);
        assert!(matches!(
            alice
                .send_attachment(PayloadKind::File, &name, "x/y", b"abc", |_| {})
                .await,
            Err(Error::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_close_rejects_further_use() {
        let (alice, _rx, _) = open("alice1", small_config());
        alice.close();
        assert!(alice.is_closed());
        assert!(matches!(alice.send_text("x").await, Err(Error::SessionClosed)));
        assert!(matches!(
            alice.receive(r#"{"_control":"online","count":1}"#),
            Err(Error::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn test_purge_stale_drops_incomplete() {
        let (alice, _arx, wire) = open("alice1", small_config());
        let (bob, _brx, _) = open("bob002", small_config());
        alice
            .send_attachment(PayloadKind::File, "a", "x/y", &[1u8; 40], |_| {})
            .await
            .unwrap();
        let frames = wire.take();
        bob.receive(&frames[0]).unwrap();
        assert_eq!(bob.in_flight(), 1);

        assert!(bob.purge_stale().is_empty());
        assert_eq!(bob.purge_stale_older_than(Duration::ZERO).len(), 1);
        assert_eq!(bob.in_flight(), 0);
    }

    #[test]
    fn test_invalid_config_rejected_on_open() {
        let transport = Arc::new(RecordingTransport::default());
        let result = TransferSession::open(
            "room",
            SessionKey::from_bytes([3u8; KEY_SIZE]),
            transport,
            Profile::new("a", "a"),
            TransferConfig {
                unit_size: 0,
                ..TransferConfig::default()
            },
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
