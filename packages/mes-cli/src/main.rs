//! MES terminal client
//!
//! Joins an ephemeral room through a relay and chats from the terminal.
//! The room key is derived locally from the invite secret; the relay only
//! ever sees sealed frames.
//!
//! ```text
//!  stdin ──► Command ──► TransferSession ──► WsTransport ──► relay
//!                             ▲                  │
//!  stdout ◄── display ◄── events ◄── on_frame ◄──┘
//! ```

mod commands;
mod display;
mod downloads;
mod ws;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{bail, eyre, WrapErr};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use mes_core::crypto::{generate_room_id, parse_invite_link};
use mes_core::transfer::session::DEFAULT_NICK;
use mes_core::{
    KeyMaterial, MessageContent, MessageOrigin, Profile, SessionEvent, TransferConfig,
    TransferSession,
};

use commands::{guess_mime, Command, HELP};
use ws::{room_url, WsTransport};

/// Interval between sweeps for abandoned inbound transfers.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "mes", version, about = "Ephemeral end-to-end encrypted rooms")]
struct Args {
    /// Relay base URL
    #[arg(long, default_value = "ws://127.0.0.1:10000", env = "MES_RELAY")]
    relay: String,

    /// Room id to join (not needed when --invite is a full link)
    #[arg(long, conflicts_with = "new")]
    room: Option<String>,

    /// Invite fragment (`k=…&s=…`) or full invite link
    #[arg(long, conflicts_with = "new")]
    invite: Option<String>,

    /// Create a new room and print its invite
    #[arg(long)]
    new: bool,

    /// Display name (trimmed, at most 24 characters)
    #[arg(long, default_value = DEFAULT_NICK)]
    nick: String,

    /// Where received attachments are written
    #[arg(long, default_value = ".")]
    download_dir: PathBuf,

    /// Seconds to wait before reconnecting to the relay
    #[arg(long, default_value_t = 3)]
    reconnect_secs: u64,
}

/// Room id and key material chosen by the arguments.
fn resolve_room(args: &Args) -> color_eyre::Result<(String, KeyMaterial)> {
    if args.new {
        return Ok((generate_room_id(), KeyMaterial::generate()));
    }

    let invite = args
        .invite
        .as_deref()
        .ok_or_else(|| eyre!("pass --new, or --invite (with --room for a bare fragment)"))?;

    if invite.contains("/room/") {
        let (room, material) = parse_invite_link(invite).wrap_err("invalid invite link")?;
        if let Some(explicit) = &args.room {
            if explicit != &room {
                bail!("--room {} does not match the invite link's room {}", explicit, room);
            }
        }
        return Ok((room, material));
    }

    let room = args
        .room
        .clone()
        .filter(|room| !room.trim().is_empty())
        .ok_or_else(|| eyre!("--room is required with an invite fragment"))?;
    let material = KeyMaterial::from_fragment(invite).wrap_err("invalid invite fragment")?;
    Ok((room, material))
}

/// `http(s)` origin matching a `ws(s)` relay URL, for invite links.
fn http_origin(relay: &str) -> String {
    let relay = relay.trim_end_matches('/');
    if let Some(rest) = relay.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else if let Some(rest) = relay.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else {
        relay.to_string()
    }
}

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mes=info,mes_core=info".into()),
        )
        .init();

    let args = Args::parse();
    let (room, material) = resolve_room(&args)?;

    if args.new {
        println!("room:   {}", room);
        println!("invite: {}", material.to_fragment());
        println!("link:   {}", material.invite_link(&http_origin(&args.relay), &room));
    }

    let key = material.derive().wrap_err("key derivation failed")?;
    let profile = Profile::generate(&args.nick);
    println!(
        "joined {} as {} ({}), /help for commands",
        room,
        profile.nickname(),
        profile.sender_id()
    );

    // ── Connection ────────────────────────────────────────────────────────

    let transport = WsTransport::new(room_url(&args.relay, &room));
    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<String>();
    let connection = transport.spawn(Duration::from_secs(args.reconnect_secs), inbound_tx);

    let (session, mut events) = TransferSession::open(
        room,
        key,
        transport.clone(),
        profile,
        TransferConfig::default(),
    )?;
    let session = Arc::new(session);

    let pump = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            while let Some(frame) = inbound_rx.recv().await {
                session.on_frame(&frame);
            }
        })
    };

    let janitor = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PURGE_INTERVAL);
            loop {
                interval.tick().await;
                session.purge_stale();
            }
        })
    };

    let download_dir = args.download_dir.clone();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Some(line) = display::describe(&event) {
                println!("{}", line);
            }
            if let SessionEvent::Message {
                message,
                origin: MessageOrigin::Remote,
            } = &event
            {
                if let MessageContent::Attachment { meta, data } = &message.content {
                    match downloads::save_attachment(&download_dir, meta, data).await {
                        Ok(path) => println!("  saved to {}", path.display()),
                        Err(e) => {
                            tracing::warn!(error = %e, name = meta.name.as_str(), "Could not save attachment")
                        }
                    }
                }
            }
        }
    });

    // ── Input Loop ────────────────────────────────────────────────────────

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let result = match Command::parse(&line) {
            Command::Empty => continue,
            Command::Quit => break,
            Command::Help => {
                println!("{}", HELP);
                continue;
            }
            Command::Invalid(reason) => {
                println!("! {}", reason);
                continue;
            }
            Command::Text(text) => session.send_text(&text).await.map(|_| ()),
            Command::Attach { kind, path } => {
                let bytes = match tokio::fs::read(&path).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        println!("! cannot read {}: {}", path.display(), e);
                        continue;
                    }
                };
                let name = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or_default()
                    .to_string();
                session
                    .send_attachment(kind, &name, guess_mime(&path), &bytes, |progress| {
                        if display::progress_worth_printing(progress) {
                            println!("{}", display::describe_progress(progress));
                        }
                    })
                    .await
                    .map(|_| ())
            }
        };

        if let Err(e) = result {
            // Disconnection already surfaced as a notice event.
            if !matches!(e, mes_core::Error::TransportUnavailable) {
                println!("! send failed: {}", e);
            }
        }
    }

    // ── Shutdown ──────────────────────────────────────────────────────────

    session.close();
    janitor.abort();
    pump.abort();
    connection.abort();
    drop(session);
    let _ = tokio::time::timeout(Duration::from_secs(1), printer).await;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
