//! Outer relay frames.
//!
//! Everything the relay fans out is one of two JSON objects:
//!
//! ```text
//! {"_control":"online","count":3}          presence, sent by the relay
//! {"iv":"<b64url 12 bytes>","ct":"<b64url>"}  sealed message, opaque to the relay
//! ```

use serde::Deserialize;
use serde_json::json;

use super::codec::{decode_bytes, encode_bytes};
use crate::crypto::Nonce;
use crate::error::{Error, Result};

/// A frame as carried by the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    /// Relay-originated control message, never encrypted
    Control(ControlFrame),
    /// An encrypted inner message
    Sealed(SealedFrame),
}

/// Control messages emitted by the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFrame {
    /// Number of connections currently in the room
    Online {
        /// Member count
        count: u32,
    },
}

/// An AES-GCM sealed inner message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedFrame {
    /// Per-frame random nonce (`iv` on the wire)
    pub nonce: Nonce,
    /// Ciphertext with the 16-byte tag appended (`ct` on the wire)
    pub ciphertext: Vec<u8>,
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "_control")]
    control: Option<String>,
    count: Option<i64>,
    iv: Option<String>,
    ct: Option<String>,
}

/// Serialize a frame to its JSON text form
pub fn encode_frame(frame: &WireFrame) -> String {
    match frame {
        WireFrame::Control(ControlFrame::Online { count }) => {
            json!({ "_control": "online", "count": count }).to_string()
        }
        WireFrame::Sealed(sealed) => json!({
            "iv": encode_bytes(sealed.nonce.as_bytes()),
            "ct": encode_bytes(&sealed.ciphertext),
        })
        .to_string(),
    }
}

/// Parse a frame received from the relay
///
/// Anything that is not a well-formed control or sealed frame fails with
/// `MalformedEnvelope`.
pub fn decode_frame(text: &str) -> Result<WireFrame> {
    let raw: RawFrame = serde_json::from_str(text)
        .map_err(|e| Error::MalformedEnvelope(format!("frame is not a JSON object: {}", e)))?;

    if let Some(control) = raw.control {
        return match control.as_str() {
            "online" => {
                let count = raw
                    .count
                    .ok_or_else(|| Error::MalformedEnvelope("online frame without count".into()))?;
                let count = u32::try_from(count).map_err(|_| {
                    Error::MalformedEnvelope(format!("online count {} out of range", count))
                })?;
                Ok(WireFrame::Control(ControlFrame::Online { count }))
            }
            other => Err(Error::MalformedEnvelope(format!(
                "unknown control frame '{}'",
                other
            ))),
        };
    }

    match (raw.iv, raw.ct) {
        (Some(iv), Some(ct)) => Ok(WireFrame::Sealed(SealedFrame {
            nonce: Nonce::from_slice(&decode_bytes(&iv)?)?,
            ciphertext: decode_bytes(&ct)?,
        })),
        _ => Err(Error::MalformedEnvelope(
            "frame has neither _control nor iv/ct".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_frame_wire_form() {
        let text = encode_frame(&WireFrame::Control(ControlFrame::Online { count: 3 }));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["_control"], "online");
        assert_eq!(value["count"], 3);

        assert_eq!(
            decode_frame(r#"{"_control":"online","count":3}"#).unwrap(),
            WireFrame::Control(ControlFrame::Online { count: 3 })
        );
    }

    #[test]
    fn test_sealed_frame_wire_form() {
        let sealed = SealedFrame {
            nonce: Nonce::from_bytes([1; 12]),
            ciphertext: vec![9; 20],
        };
        let text = encode_frame(&WireFrame::Sealed(sealed.clone()));
        assert!(text.contains(r#""iv":"AQEBAQEBAQEBAQEB""#));

        assert_eq!(decode_frame(&text).unwrap(), WireFrame::Sealed(sealed));
    }

    #[test]
    fn test_padded_fields_accepted() {
        let frame = decode_frame(r#"{"iv":"AQEBAQEBAQEBAQEB","ct":"aGk="}"#).unwrap();
        match frame {
            WireFrame::Sealed(sealed) => assert_eq!(sealed.ciphertext, b"hi"),
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_malformed_frames_rejected() {
        let cases = [
            "not json",
            "[]",
            "{}",
            r#"{"_control":"typing"}"#,
            r#"{"_control":"online"}"#,
            r#"{"_control":"online","count":-1}"#,
            r#"{"_control":"online","count":"2"}"#,
            r#"{"iv":"AQEBAQEBAQEBAQEB"}"#,
            r#"{"ct":"aGk"}"#,
            // 16-byte iv
            r#"{"iv":"AAAAAAAAAAAAAAAAAAAAAA","ct":"aGk"}"#,
            r#"{"iv":"AQEBAQEBAQEBAQEB","ct":"***"}"#,
        ];
        for case in cases {
            assert!(
                matches!(decode_frame(case), Err(Error::MalformedEnvelope(_))),
                "accepted {}",
                case
            );
        }
    }
}
