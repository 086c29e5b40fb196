//! base64url helpers shared by the frame codec, the message codec, invite
//! fragments and the chunk size accounting.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

use crate::error::{Error, Result};

/// Encode bytes as base64url without padding.
pub fn encode_bytes(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode base64url text. Trailing `=` padding is tolerated.
pub fn decode_bytes(text: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(text.trim_end_matches('='))
        .map_err(|e| Error::MalformedEnvelope(format!("invalid base64url: {}", e)))
}

/// Exact length of the unpadded base64 encoding of `n` bytes, or `None`
/// when it does not fit in a `usize`.
pub const fn encoded_len(n: usize) -> Option<usize> {
    let full = match (n / 3).checked_mul(4) {
        Some(full) => full,
        None => return None,
    };
    full.checked_add((n % 3 * 4 + 2) / 3)
}

/// Largest number of bytes whose unpadded encoding fits in `chars`.
pub const fn decoded_capacity(chars: usize) -> usize {
    chars / 4 * 3 + chars % 4 * 3 / 4
}

/// Serde adapter for `Vec<u8>` fields carried as base64url strings.
pub(crate) mod base64url {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_bytes(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::decode_bytes(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_len_matches_encoder() {
        for n in [0usize, 1, 2, 3, 4, 5, 16, 255, 256 * 1024] {
            assert_eq!(encode_bytes(&vec![0xA5; n]).len(), encoded_len(n).unwrap(), "n = {}", n);
        }
    }

    #[test]
    fn test_encoded_len_overflow() {
        assert_eq!(encoded_len(usize::MAX), None);
        assert_eq!(encoded_len(usize::MAX / 3 * 3), None);
        assert!(encoded_len(usize::MAX / 4 * 3).is_some());
    }

    #[test]
    fn test_decoded_capacity_inverts_encoded_len() {
        for chars in [0usize, 1, 2, 3, 4, 7, 8, 349_528] {
            let n = decoded_capacity(chars);
            assert!(encoded_len(n).unwrap() <= chars, "chars = {}", chars);
            assert!(encoded_len(n + 1).unwrap() > chars, "chars = {}", chars);
        }
        assert_eq!(decoded_capacity(usize::MAX), usize::MAX / 4 * 3 + 2);
    }

    #[test]
    fn test_url_safe_alphabet() {
        let encoded = encode_bytes(&[0xFB, 0xFF, 0xBF]);
        assert_eq!(encoded, "-_-_");
        assert_eq!(decode_bytes(&encoded).unwrap(), vec![0xFB, 0xFF, 0xBF]);
    }

    #[test]
    fn test_padding_tolerated() {
        assert_eq!(decode_bytes("aGk=").unwrap(), b"hi");
        assert_eq!(decode_bytes("aGk").unwrap(), b"hi");
    }

    #[test]
    fn test_invalid_rejected() {
        assert!(matches!(
            decode_bytes("not base64!"),
            Err(Error::MalformedEnvelope(_))
        ));
        // standard alphabet characters are not url-safe
        assert!(decode_bytes("ab+/").is_err());
    }
}
