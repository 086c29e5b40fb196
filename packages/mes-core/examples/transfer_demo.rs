//! # Transfer Demo
//!
//! Two sessions sharing one room key, wired together by an in-memory
//! transport. Alice sends a text and a 1 MiB file; Bob reassembles it.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example transfer_demo
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use mes_core::crypto::generate_room_id;
use mes_core::{
    ConnectionState, KeyMaterial, MessageContent, PayloadKind, Profile, Result, SessionEvent,
    TransferConfig, TransferSession, Transport,
};

/// Forwards every frame to a channel, like a relay with one other member.
struct Loopback(mpsc::UnboundedSender<String>);

#[async_trait]
impl Transport for Loopback {
    async fn send(&self, frame: String) -> Result<()> {
        self.0
            .send(frame)
            .map_err(|_| mes_core::Error::Transport("peer gone".into()))
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::Open
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== MES Core: Chunked Transfer Demo ===\n");

    // Step 1: One side creates the room; the invite carries the secret.
    let room = generate_room_id();
    let material = KeyMaterial::generate();
    println!("Step 1: Room {} created", room);
    println!("  Invite link: {}", material.invite_link("https://mes.example", &room));
    println!();

    // Step 2: Both sides derive the same key from the invite.
    println!("Step 2: Deriving the room key (PBKDF2-SHA256)...");
    let alice_key = material.derive()?;
    let bob_key = KeyMaterial::from_fragment(&material.to_fragment())?.derive()?;
    println!();

    let (wire_tx, mut wire_rx) = mpsc::unbounded_channel();
    let (alice, _alice_events) = TransferSession::open(
        room.clone(),
        alice_key,
        Arc::new(Loopback(wire_tx)),
        Profile::generate("alice"),
        TransferConfig::default(),
    )?;
    let (bob_out, _unused) = mpsc::unbounded_channel();
    let (bob, mut bob_events) = TransferSession::open(
        room,
        bob_key,
        Arc::new(Loopback(bob_out)),
        Profile::generate("bob"),
        TransferConfig::default(),
    )?;

    // Step 3: Alice sends.
    println!("Step 3: Alice sends a text and a 1 MiB file...");
    alice.send_text("hello bob").await?;
    let file: Vec<u8> = (0..1024 * 1024).map(|i| (i % 251) as u8).collect();
    alice
        .send_attachment(
            PayloadKind::File,
            "blob.bin",
            "application/octet-stream",
            &file,
            |p| println!("  sent {}/{} units", p.done, p.total),
        )
        .await?;
    println!();

    // Step 4: Bob receives the frames, in reverse order to show reassembly.
    println!("Step 4: Bob receives (last frame first)...");
    let mut frames = Vec::new();
    while let Ok(frame) = wire_rx.try_recv() {
        frames.push(frame);
    }
    for frame in frames.iter().rev() {
        bob.on_frame(frame);
    }

    while let Ok(event) = bob_events.try_recv() {
        match event {
            SessionEvent::Progress(p) => println!("  received {}/{} units", p.done, p.total),
            SessionEvent::Message { message, .. } => match message.content {
                MessageContent::Text(text) => println!("  {} says: {}", message.nick, text),
                MessageContent::Attachment { meta, data } => {
                    println!(
                        "  {} sent {} ({} bytes, intact: {})",
                        message.nick,
                        meta.name,
                        meta.size,
                        data == file
                    );
                }
            },
            _ => {}
        }
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
