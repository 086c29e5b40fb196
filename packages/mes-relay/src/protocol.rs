//! Relay control messages.
//!
//! The relay never parses client frames. The only JSON it produces itself is
//! the presence announcement, distinguished from sealed frames by the
//! `_control` key.

use serde::{Deserialize, Serialize};

// ── Relay → Client ────────────────────────────────────────────────────────────

/// Messages originated by the relay.
///
/// `Deserialize` is only exercised by tests, which parse what clients see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "_control", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Current member count of the room.
    Online {
        /// Connections in the room, the receiving one included
        count: usize,
    },
}

impl ControlMessage {
    /// Serialize to the wire text.
    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_online_wire_text() {
        let text = ControlMessage::Online { count: 3 }.to_text().unwrap();
        assert_eq!(text, r#"{"_control":"online","count":3}"#);
    }

    #[test]
    fn test_online_roundtrip() {
        let msg = ControlMessage::Online { count: 12 };
        let parsed: ControlMessage = serde_json::from_str(&msg.to_text().unwrap()).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_client_frames_are_not_control() {
        let sealed = r#"{"iv":"AAAAAAAAAAAAAAAA","ct":"abc"}"#;
        assert!(serde_json::from_str::<ControlMessage>(sealed).is_err());
    }
}
