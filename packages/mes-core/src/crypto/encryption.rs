//! # Encryption Module
//!
//! AES-256-GCM sealing of inner messages into relay frames.
//!
//! ## Frame Encryption Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      FRAME ENCRYPTION FLOW                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Step 1: Generate Nonce (unique per frame)                             │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  Random 12 bytes from OsRng                                  │       │
//! │  │  (Never reuse a nonce with the same key!)                   │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Step 2: Encrypt                                                       │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  AES-256-GCM(                                                │       │
//! │  │    key = session_key,                                       │       │
//! │  │    nonce = random_nonce,                                    │       │
//! │  │    plaintext = inner JSON message,                          │       │
//! │  │  )                                                          │       │
//! │  │           ↓                                                  │       │
//! │  │  Ciphertext + 16-byte Auth Tag                              │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Output: SealedFrame { nonce, ciphertext } → {"iv":…,"ct":…}          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Properties
//!
//! | Property | Guarantee |
//! |----------|-----------|
//! | Confidentiality | Only holders of the invite secret can read frames |
//! | Integrity | Any modification is detected |
//! | Replay | Not prevented; duplicates are absorbed by reassembly |

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce as AesNonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};
use crate::protocol::SealedFrame;

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Size of the session key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// A nonce (number used once) for AES-GCM encryption
///
/// ## Critical Security Requirement
///
/// **NEVER reuse a nonce with the same key!**
///
/// Nonces are only ever created by [`encrypt`] from `OsRng`, which is safe
/// for up to 2^32 frames per key (birthday bound for 96-bit nonces). Incoming
/// nonces are parsed from the wire with [`Nonce::from_bytes`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Nonce(pub [u8; NONCE_SIZE]);

impl Nonce {
    /// Generate a cryptographically random nonce
    pub(crate) fn random() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from existing bytes
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, which must be exactly [`NONCE_SIZE`] bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; NONCE_SIZE] = bytes.try_into().map_err(|_| {
            Error::MalformedEnvelope(format!(
                "iv must be {} bytes, got {}",
                NONCE_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// The room's AES-256-GCM key
///
/// Derived once per room, held in memory only, and zeroized when dropped.
/// Deliberately neither `Clone` nor printable.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; KEY_SIZE]);

impl SessionKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.0).map_err(|e| Error::InvalidKey(e.to_string()))
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(<redacted>)")
    }
}

/// Encrypt an inner message using AES-256-GCM
///
/// A fresh random nonce is drawn on every call.
///
/// ## Example
///
/// ```ignore
/// let key = SessionKey::from_bytes([0u8; 32]);
/// let sealed = encrypt(&key, br#"{"kind":"text"}"#)?;
/// ```
pub fn encrypt(key: &SessionKey, plaintext: &[u8]) -> Result<SealedFrame> {
    let nonce = Nonce::random();
    let ciphertext = key
        .cipher()?
        .encrypt(AesNonce::from_slice(&nonce.0), plaintext)
        .map_err(|e| Error::EncryptionFailed(format!("Encryption failed: {}", e)))?;

    Ok(SealedFrame { nonce, ciphertext })
}

/// Decrypt a sealed frame using AES-256-GCM
///
/// ## Errors
///
/// Returns `AuthenticationFailure` if:
/// - The ciphertext or tag was tampered with
/// - The frame was sealed under a different key
/// - The nonce is wrong
pub fn decrypt(key: &SessionKey, sealed: &SealedFrame) -> Result<Vec<u8>> {
    key.cipher()?
        .decrypt(AesNonce::from_slice(&sealed.nonce.0), sealed.ciphertext.as_slice())
        .map_err(|_| Error::AuthenticationFailure)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SessionKey {
        SessionKey::from_bytes([7u8; KEY_SIZE])
    }

    #[test]
    fn test_encrypt_decrypt() {
        let key = test_key();
        let plaintext = b"Hello, room!";

        let sealed = encrypt(&key, plaintext).unwrap();
        let decrypted = decrypt(&key, &sealed).unwrap();

        assert_eq!(plaintext.as_slice(), decrypted.as_slice());
    }

    #[test]
    fn test_ciphertext_carries_tag() {
        let sealed = encrypt(&test_key(), b"abc").unwrap();
        assert_eq!(sealed.ciphertext.len(), 3 + TAG_SIZE);
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = encrypt(&test_key(), b"Secret").unwrap();
        let other = SessionKey::from_bytes([8u8; KEY_SIZE]);

        assert!(matches!(
            decrypt(&other, &sealed),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = test_key();
        let mut sealed = encrypt(&key, b"Secret").unwrap();
        sealed.ciphertext[0] ^= 0xFF;

        assert!(matches!(
            decrypt(&key, &sealed),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_wrong_nonce_fails() {
        let key = test_key();
        let mut sealed = encrypt(&key, b"Secret").unwrap();
        sealed.nonce.0[11] ^= 0x01;

        assert!(decrypt(&key, &sealed).is_err());
    }

    #[test]
    fn test_nonces_differ_per_call() {
        let key = test_key();
        let a = encrypt(&key, b"same").unwrap();
        let b = encrypt(&key, b"same").unwrap();

        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_nonce_from_slice_length() {
        assert!(Nonce::from_slice(&[0u8; NONCE_SIZE]).is_ok());
        assert!(matches!(
            Nonce::from_slice(&[0u8; 16]),
            Err(Error::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_session_key_debug_is_redacted() {
        let printed = format!("{:?}", test_key());
        assert_eq!(printed, "SessionKey(<redacted>)");
    }
}
