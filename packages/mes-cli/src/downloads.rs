//! Writing received attachments to disk.

use std::io;
use std::path::{Path, PathBuf};

use mes_core::protocol::TransferMeta;
use mes_core::PayloadKind;

const MAX_NAME_CHARS: usize = 128;

/// Name used when the sender supplied none.
pub fn fallback_name(kind: PayloadKind) -> &'static str {
    match kind {
        PayloadKind::Image => "image",
        PayloadKind::Audio => "voice.wav",
        PayloadKind::Text => "message.txt",
        PayloadKind::File => "file.bin",
    }
}

/// Reduce a sender-supplied name to a single safe path component.
pub fn sanitize_file_name(name: &str, kind: PayloadKind) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_CHARS)
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.');

    if cleaned.is_empty() {
        fallback_name(kind).to_string()
    } else {
        cleaned.to_string()
    }
}

/// Save `data` under `dir` without overwriting an existing file.
pub async fn save_attachment(dir: &Path, meta: &TransferMeta, data: &[u8]) -> io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    let name = sanitize_file_name(&meta.name, meta.kind);
    let path = unique_path(dir, &name).await?;
    tokio::fs::write(&path, data).await?;
    Ok(path)
}

async fn unique_path(dir: &Path, name: &str) -> io::Result<PathBuf> {
    let candidate = dir.join(name);
    if !tokio::fs::try_exists(&candidate).await? {
        return Ok(candidate);
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    for n in 1.. {
        let numbered = match ext {
            Some(ext) => format!("{}-{}.{}", stem, n, ext),
            None => format!("{}-{}", stem, n),
        };
        let candidate = dir.join(numbered);
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
    }
    Err(io::Error::new(io::ErrorKind::AlreadyExists, "no free file name"))
}
