//! # Error Handling
//!
//! Error types for the MES transfer core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Codec Errors (drop + log, never fatal)                            │
//! │  │   ├── MalformedEnvelope     - Unparseable or invalid frame          │
//! │  │   └── Serialization         - Outbound encoding failed              │
//! │  │                                                                      │
//! │  ├── Crypto Errors                                                     │
//! │  │   ├── AuthenticationFailure - AEAD tag check failed (drop silently) │
//! │  │   ├── EncryptionFailed      - Encryption operation failed           │
//! │  │   ├── KeyDerivationFailed   - PBKDF2 input rejected                 │
//! │  │   └── InvalidKey            - Invalid key material                  │
//! │  │                                                                      │
//! │  ├── Transport Errors                                                  │
//! │  │   ├── TransportUnavailable  - Send while not connected (notice)     │
//! │  │   ├── Transport             - Transport reported a send failure     │
//! │  │   └── FrameTooLarge         - Frame exceeds the relay ceiling       │
//! │  │                                                                      │
//! │  └── Session Errors                                                    │
//! │      ├── SessionClosed         - Session already closed                │
//! │      └── InvalidConfig         - Transfer configuration rejected       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An incomplete transfer is not an error. While chunks are still missing the
//! reassembler reports `ChunkOutcome::Assembling`.
//!
//! No error produced here terminates the session or the connection. The
//! connection lifecycle belongs to the transport, which reconnects on its own.

use thiserror::Error;

/// Result type alias for MES core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the MES core
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Codec Errors (100-199)
    // ========================================================================

    /// Frame or inner message is unparseable or structurally invalid
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Failed to serialize an outbound message
    #[error("Serialization error: {0}")]
    Serialization(String),

    // ========================================================================
    // Crypto Errors (200-299)
    // ========================================================================

    /// Decryption failed: tampered, corrupted, or encrypted under another key
    #[error("Authentication failed: ciphertext rejected")]
    AuthenticationFailure,

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Key derivation rejected its input
    #[error("Failed to derive session key: {0}")]
    KeyDerivationFailed(String),

    /// Invalid key material
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    // ========================================================================
    // Transport Errors (300-399)
    // ========================================================================

    /// Send attempted while the transport is not connected
    #[error("Not connected to the relay.")]
    TransportUnavailable,

    /// Transport reported a failure while sending
    #[error("Transport error: {0}")]
    Transport(String),

    /// Encoded frame exceeds the transport's message ceiling
    #[error("Frame of {len} bytes exceeds the {limit} byte limit")]
    FrameTooLarge {
        /// Encoded frame length
        len: usize,
        /// Configured ceiling
        limit: usize,
    },

    // ========================================================================
    // Session Errors (400-499)
    // ========================================================================

    /// The session has been closed
    #[error("Transfer session is closed.")]
    SessionClosed,

    /// Transfer configuration rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the numeric error code
    ///
    /// Error codes are organized by category:
    /// - 100-199: Codec
    /// - 200-299: Crypto
    /// - 300-399: Transport
    /// - 400-499: Session
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            // Codec (100-199)
            Error::MalformedEnvelope(_) => 100,
            Error::Serialization(_) => 101,

            // Crypto (200-299)
            Error::AuthenticationFailure => 200,
            Error::EncryptionFailed(_) => 201,
            Error::KeyDerivationFailed(_) => 202,
            Error::InvalidKey(_) => 203,

            // Transport (300-399)
            Error::TransportUnavailable => 300,
            Error::Transport(_) => 301,
            Error::FrameTooLarge { .. } => 302,

            // Session (400-499)
            Error::SessionClosed => 400,
            Error::InvalidConfig(_) => 401,

            // Internal (900-999)
            Error::Internal(_) => 900,
        }
    }

    /// Per-message failure on the receive path.
    ///
    /// These are logged and the offending envelope is skipped; processing of
    /// subsequent envelopes continues unaffected.
    pub fn is_droppable(&self) -> bool {
        matches!(
            self,
            Error::MalformedEnvelope(_) | Error::AuthenticationFailure
        )
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors clear up once the transport reconnects.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::TransportUnavailable | Error::Transport(_))
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::MalformedEnvelope("x".into()).code(), 100);
        assert_eq!(Error::AuthenticationFailure.code(), 200);
        assert_eq!(Error::TransportUnavailable.code(), 300);
        assert_eq!(Error::SessionClosed.code(), 400);
        assert_eq!(Error::Internal("test".into()).code(), 900);
    }

    #[test]
    fn test_droppable_errors() {
        assert!(Error::MalformedEnvelope("bad".into()).is_droppable());
        assert!(Error::AuthenticationFailure.is_droppable());
        assert!(!Error::TransportUnavailable.is_droppable());
        assert!(!Error::SessionClosed.is_droppable());
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(Error::TransportUnavailable.is_recoverable());
        assert!(Error::Transport("reset".into()).is_recoverable());
        assert!(!Error::AuthenticationFailure.is_recoverable());
    }

    #[test]
    fn test_frame_too_large_message() {
        let err = Error::FrameTooLarge {
            len: 2_000_000,
            limit: 1_600_000,
        };
        let msg = err.to_string();
        assert!(msg.contains("2000000"));
        assert!(msg.contains("1600000"));
    }
}
