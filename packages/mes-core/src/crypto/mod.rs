//! # Cryptography Module
//!
//! The crypto gateway for a room: one key derivation and an authenticated
//! seal/open pair. The rest of the core only ever sees [`SessionKey`] and
//! [`SealedFrame`](crate::protocol::SealedFrame).
//!
//! ## Security Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    ROOM KEY ARCHITECTURE                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Invite link:  https://host/room/<room>#k=<secret>&s=<salt>            │
//! │                                    │                                    │
//! │            (fragment never reaches the relay)                           │
//! │                                    ▼                                    │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  KeyMaterial { secret: 32 bytes, salt: 16 bytes }               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │                                ▼                                        │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  PBKDF2-HMAC-SHA256(secret, salt, 200 000 rounds) → 32 bytes   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │                                ▼                                        │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  SessionKey (AES-256-GCM, zeroized on drop, memory only)       │   │
//! │  │                                                                 │   │
//! │  │  encrypt: fresh 96-bit OsRng nonce per call → {iv, ct}         │   │
//! │  │  decrypt: tag mismatch → AuthenticationFailure                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Algorithm Choices
//!
//! | Algorithm | Purpose | Notes |
//! |-----------|---------|-------|
//! | PBKDF2-HMAC-SHA256 | Key Derivation | Same parameters as the browser client |
//! | AES-256-GCM | Encryption | No associated data; bare 12-byte IV |
//!
//! ## Security Considerations
//!
//! 1. **Key Zeroization**: [`SessionKey`] and [`KeyMaterial`] wipe themselves on drop
//! 2. **Secure Random**: `rand::rngs::OsRng` for nonces, secrets and ids
//! 3. **No Nonce Reuse**: callers cannot supply a nonce to [`encrypt`]

mod encryption;
mod kdf;

pub use encryption::{decrypt, encrypt, Nonce, SessionKey, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use kdf::{
    derive_session_key, derive_session_key_with_iterations, generate_room_id,
    generate_sender_id, parse_invite_link, KeyMaterial, KDF_ITERATIONS, MIN_KDF_ITERATIONS,
    ROOM_ID_LEN, SALT_SIZE, SECRET_SIZE, SENDER_ID_LEN,
};
