//! # MES Core
//!
//! The chunked, end-to-end encrypted transfer engine behind MES ephemeral
//! rooms. The relay only ever sees opaque frames; everything readable lives
//! here.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          MES CORE                                       │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   outbound payload                          inbound frame               │
//! │         │                                         │                     │
//! │         ▼                                         ▼                     │
//! │  ┌──────────────┐  atomic / chunked     ┌──────────────┐               │
//! │  │   Transfer   │──────────────────────►│   Framing    │               │
//! │  │   Session    │◄──────────────────────│    Codec     │               │
//! │  └──────┬───────┘  route by kind        └──────┬───────┘               │
//! │         │                                      │                        │
//! │   ┌─────┴──────┐                       ┌───────┴──────┐                │
//! │   │  Chunker   │                       │    Crypto    │                │
//! │   │ Reassembler│                       │   Gateway    │                │
//! │   └────────────┘                       └──────────────┘                │
//! │                                                                         │
//! │                 Transport (trait) ◄──► relay WebSocket                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`crypto`] - Room key derivation and AES-256-GCM sealing
//! - [`protocol`] - Outer relay frames and inner chat messages
//! - [`transfer`] - Chunking, reassembly and the transfer session
//! - [`transport`] - The connection seam implemented by clients
//! - [`config`] - Transfer tunables
//!
//! ## Security Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Room secret + salt live only in the invite fragment and in memory.    │
//! │  Every frame is sealed under a fresh random 96-bit nonce.              │
//! │  Frames that fail authentication are dropped, never surfaced.          │
//! │  Keys, secrets and plaintext never reach the logs.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod config;
pub mod crypto;
pub mod error;
pub mod protocol;
/// Wall-clock helpers for message timestamps.
pub mod time;
pub mod transfer;
pub mod transport;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use config::TransferConfig;
pub use crypto::{derive_session_key, KeyMaterial, SessionKey};
pub use error::{Error, Result};
pub use protocol::PayloadKind;
pub use transfer::{
    ChatMessage, MessageContent, MessageOrigin, Profile, Received, SessionEvent, TransferProgress,
    TransferSession,
};
pub use transport::{ConnectionState, Transport};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of MES Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
