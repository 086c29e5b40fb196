//! Stdin command parsing.

use std::path::{Path, PathBuf};

use mes_core::PayloadKind;

/// One line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text message
    Text(String),
    /// Send a file from disk
    Attach { kind: PayloadKind, path: PathBuf },
    /// Print the command list
    Help,
    /// Leave the room
    Quit,
    /// Blank line
    Empty,
    /// Unknown command or missing argument
    Invalid(String),
}

/// Command list printed by `/help`.
pub const HELP: &str = "\
  <text>          send a message
  /file PATH      send a file (images are sent as images)
  /image PATH     send an image
  /voice PATH     send a voice recording
  /quit           leave the room";

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Command::Empty;
        }
        if !line.starts_with('/') {
            return Command::Text(line.to_string());
        }

        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (line, ""),
        };

        let kind = match name {
            "/quit" | "/exit" => return Command::Quit,
            "/help" => return Command::Help,
            "/file" => None,
            "/image" => Some(PayloadKind::Image),
            "/voice" => Some(PayloadKind::Audio),
            other => return Command::Invalid(format!("unknown command {}", other)),
        };

        if arg.is_empty() {
            return Command::Invalid(format!("usage: {} PATH", name));
        }
        let path = PathBuf::from(arg);
        let kind = kind.unwrap_or_else(|| {
            if guess_mime(&path).starts_with("image/") {
                PayloadKind::Image
            } else {
                PayloadKind::File
            }
        });
        Command::Attach { kind, path }
    }
}

/// MIME type from a file extension.
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "ogg" | "oga" => "audio/ogg",
        "m4a" => "audio/mp4",
        "webm" => "audio/webm",
        "txt" | "md" => "text/plain",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}
