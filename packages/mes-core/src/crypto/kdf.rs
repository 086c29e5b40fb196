//! # Key Derivation Functions
//!
//! Room key derivation from the out-of-band invite secret, plus generation of
//! the random material that makes up a room: secret, salt, room id and the
//! per-session sender id.
//!
//! ## Key Derivation
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    ROOM KEY DERIVATION                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  KeyMaterial::generate()                                        │   │
//! │  │    secret = 32 random bytes    salt = 16 random bytes           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │                                ▼                                        │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  PBKDF2-HMAC-SHA256(                                           │   │
//! │  │    password = secret,                                          │   │
//! │  │    salt = salt,                                                │   │
//! │  │    iterations = 200 000,                                       │   │
//! │  │    output_length = 32 bytes                                    │   │
//! │  │  )                                                             │   │
//! │  │                                                                 │   │
//! │  │  → SessionKey (AES-256-GCM)                                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invite Fragment
//!
//! The secret and salt travel in the URL fragment as base64url without
//! padding: `#k=<secret>&s=<salt>`. Browsers never send the fragment to the
//! server, so the relay only ever learns the room id.
//!
//! ## Security Considerations
//!
//! | Aspect | Design Choice |
//! |--------|---------------|
//! | KDF Algorithm | PBKDF2-HMAC-SHA256, interoperable with WebCrypto |
//! | Work Factor | 200 000 rounds, never below 100 000 |
//! | Secret Entropy | 256 bits from OsRng |

use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::encryption::{SessionKey, KEY_SIZE};
use crate::error::{Error, Result};
use crate::protocol::{decode_bytes, encode_bytes};

/// PBKDF2 iteration count used for every room key
pub const KDF_ITERATIONS: u32 = 200_000;

/// Lowest iteration count accepted by [`derive_session_key_with_iterations`]
pub const MIN_KDF_ITERATIONS: u32 = 100_000;

/// Size of the shared room secret in bytes
pub const SECRET_SIZE: usize = 32;

/// Size of the PBKDF2 salt in bytes
pub const SALT_SIZE: usize = 16;

/// Length of a generated room id
pub const ROOM_ID_LEN: usize = 12;

/// Length of a generated sender id
pub const SENDER_ID_LEN: usize = 6;

/// Derive the room's session key with the standard work factor
///
/// ## Errors
///
/// `KeyDerivationFailed` if either input is empty.
pub fn derive_session_key(secret: &[u8], salt: &[u8]) -> Result<SessionKey> {
    derive_session_key_with_iterations(secret, salt, KDF_ITERATIONS)
}

/// Derive the room's session key with an explicit iteration count
///
/// Counts below [`MIN_KDF_ITERATIONS`] are rejected.
pub fn derive_session_key_with_iterations(
    secret: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<SessionKey> {
    if secret.is_empty() {
        return Err(Error::KeyDerivationFailed("secret is empty".into()));
    }
    if salt.is_empty() {
        return Err(Error::KeyDerivationFailed("salt is empty".into()));
    }
    if iterations < MIN_KDF_ITERATIONS {
        return Err(Error::KeyDerivationFailed(format!(
            "{} iterations is below the minimum of {}",
            iterations, MIN_KDF_ITERATIONS
        )));
    }

    let mut key = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(secret, salt, iterations, &mut key);
    let session_key = SessionKey::from_bytes(key);
    key.zeroize();

    Ok(session_key)
}

/// The out-of-band key source of a room
///
/// Wiped from memory when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    /// Shared room secret
    pub secret: [u8; SECRET_SIZE],
    /// PBKDF2 salt
    pub salt: [u8; SALT_SIZE],
}

impl KeyMaterial {
    /// Generate fresh random material for a new room
    pub fn generate() -> Self {
        let mut secret = [0u8; SECRET_SIZE];
        let mut salt = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut secret);
        rand::rngs::OsRng.fill_bytes(&mut salt);
        Self { secret, salt }
    }

    /// Derive the session key for this material
    pub fn derive(&self) -> Result<SessionKey> {
        derive_session_key(&self.secret, &self.salt)
    }

    /// Render as an invite fragment: `k=<secret>&s=<salt>`
    pub fn to_fragment(&self) -> String {
        format!("k={}&s={}", encode_bytes(&self.secret), encode_bytes(&self.salt))
    }

    /// Parse an invite fragment, with or without the leading `#`
    pub fn from_fragment(fragment: &str) -> Result<Self> {
        let fragment = fragment.trim().trim_start_matches('#');

        let mut secret = None;
        let mut salt = None;
        for pair in fragment.split('&') {
            match pair.split_once('=') {
                Some(("k", value)) => secret = Some(value),
                Some(("s", value)) => salt = Some(value),
                _ => {}
            }
        }

        let secret = secret.ok_or_else(|| Error::InvalidKey("fragment has no k=".into()))?;
        let salt = salt.ok_or_else(|| Error::InvalidKey("fragment has no s=".into()))?;

        Ok(Self {
            secret: decode_fixed(secret, "secret")?,
            salt: decode_fixed(salt, "salt")?,
        })
    }

    /// Build the full invite link for `room` under `origin`
    pub fn invite_link(&self, origin: &str, room: &str) -> String {
        format!(
            "{}/room/{}#{}",
            origin.trim_end_matches('/'),
            room,
            self.to_fragment()
        )
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyMaterial(<redacted>)")
    }
}

fn decode_fixed<const N: usize>(value: &str, what: &str) -> Result<[u8; N]> {
    let bytes = decode_bytes(value).map_err(|_| Error::InvalidKey(format!("{} is not base64url", what)))?;
    bytes.as_slice().try_into().map_err(|_| {
        Error::InvalidKey(format!("{} must be {} bytes, got {}", what, N, bytes.len()))
    })
}

/// Split an invite link (`…/room/<id>#k=…&s=…`) into room id and key material
pub fn parse_invite_link(link: &str) -> Result<(String, KeyMaterial)> {
    let (path, fragment) = link
        .trim()
        .split_once('#')
        .ok_or_else(|| Error::InvalidKey("invite link has no fragment".into()))?;

    let room = path
        .trim_end_matches('/')
        .rsplit_once("/room/")
        .map(|(_, room)| room)
        .filter(|room| !room.is_empty() && room.chars().all(|c| c.is_ascii_alphanumeric()))
        .ok_or_else(|| Error::InvalidKey("invite link has no /room/<id> path".into()))?;

    Ok((room.to_string(), KeyMaterial::from_fragment(fragment)?))
}

fn random_alphanumeric(len: usize) -> String {
    rand::rngs::OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate a random room id (12 characters from `[a-zA-Z0-9]`)
pub fn generate_room_id() -> String {
    random_alphanumeric(ROOM_ID_LEN)
}

/// Generate a random per-session sender id (6 characters from `[a-zA-Z0-9]`)
pub fn generate_sender_id() -> String {
    random_alphanumeric(SENDER_ID_LEN)
}

// ============================================================================
// TESTS
// ============================================================================
