//! # Payload Chunking
//!
//! Splits oversized payloads into ordered, bounded-size units for transfer.
//!
//! ## Frame Size Accounting
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    ONE UNIT ON THE WIRE                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  raw slice                         unit_size bytes                      │
//! │      │ base64url (4:3)                                                  │
//! │      ▼                                                                  │
//! │  inner JSON "data" field           encoded_len(unit_size)               │
//! │      + id, sender, nick, meta…     + INNER_OVERHEAD                     │
//! │      │ AES-256-GCM                                                      │
//! │      ▼                                                                  │
//! │  ciphertext                        + TAG_SIZE (16)                      │
//! │      │ base64url (4:3)                                                  │
//! │      ▼                                                                  │
//! │  outer {"iv":…,"ct":…}             encoded_len(ct) + OUTER_OVERHEAD     │
//! │                                                                         │
//! │  The result must stay under the relay's frame ceiling.                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Payloads no larger than one unit take the atomic fast path and are sent
//! as a single message with no reassembly.
//!
//! ## Unit Alignment
//!
//! Unit sizes are kept at multiples of 3 so every full slice encodes to
//! whole 4-character base64 groups. Receivers may then decode each slice on
//! its own or join the encoded slices first and decode once.

use crate::crypto::TAG_SIZE;
use crate::error::{Error, Result};
use crate::protocol::{decoded_capacity, encoded_len};

/// Default unit size: 256 KiB of raw payload, rounded up to a multiple of 3
pub const DEFAULT_UNIT_SIZE: usize = 256 * 1024 + 2;

/// Default relay frame ceiling, in characters
pub const DEFAULT_MAX_FRAME_LEN: usize = 1_600_000;

/// Allowance for the inner JSON fields around the data slice.
///
/// Covers the ids, nickname, timestamp and `meta` (including the file name).
pub const INNER_OVERHEAD: usize = 4 * 1024;

/// Allowance for the outer `{"iv":…,"ct":…}` wrapper, nonce included
pub const OUTER_OVERHEAD: usize = 64;

// ---------------------------------------------------------------------------
// Splitting
// ---------------------------------------------------------------------------

/// Split a payload into ordered slices of at most `unit_size` bytes.
///
/// All slices but the last are exactly `unit_size` long. An empty payload
/// yields a single empty slice.
pub fn split(payload: &[u8], unit_size: usize) -> Result<Vec<&[u8]>> {
    if unit_size == 0 {
        return Err(Error::InvalidConfig("unit size must be > 0".to_string()));
    }
    if payload.is_empty() {
        return Ok(vec![payload]);
    }
    Ok(payload.chunks(unit_size).collect())
}

/// Number of units a payload of `len` bytes occupies (at least 1).
pub fn unit_count(len: usize, unit_size: usize) -> usize {
    len.div_ceil(unit_size.max(1)).max(1)
}

/// Whether a payload of `len` bytes fits in a single unit.
pub fn is_atomic(len: usize, unit_size: usize) -> bool {
    len <= unit_size
}

// ---------------------------------------------------------------------------
// Frame size estimates
// ---------------------------------------------------------------------------

/// Worst-case wire frame length for a full unit of `unit_size` bytes.
///
/// Returns `None` when the length does not fit in a `usize`.
pub fn estimated_frame_len(unit_size: usize) -> Option<usize> {
    let inner = encoded_len(unit_size)?.checked_add(INNER_OVERHEAD + TAG_SIZE)?;
    encoded_len(inner)?.checked_add(OUTER_OVERHEAD)
}

/// Largest unit size, a multiple of 3, whose worst-case frame fits in
/// `max_frame_len`.
///
/// Returns `None` when not even a three-byte unit fits.
pub fn max_unit_for_frame(max_frame_len: usize) -> Option<usize> {
    let ct_text = max_frame_len.checked_sub(OUTER_OVERHEAD)?;
    let data_text = decoded_capacity(ct_text).checked_sub(TAG_SIZE + INNER_OVERHEAD)?;
    let unit = decoded_capacity(data_text);
    let unit = unit - unit % 3;
    (unit > 0).then_some(unit)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{decode_bytes, encode_bytes};

    #[test]
    fn test_split_short_last_slice() {
        let data = b"Hello, room! This is a test payload for chunking.";
        let slices = split(data, 16).unwrap();

        assert_eq!(slices.len(), unit_count(data.len(), 16));
        assert_eq!(slices.len(), 4); // 50 bytes / 16
        assert!(slices[..3].iter().all(|s| s.len() == 16));
        assert_eq!(slices[3].len(), 2);
        assert_eq!(slices.concat(), data);
    }

    #[test]
    fn test_exact_unit_boundary() {
        let data = vec![0xABu8; 32];
        let slices = split(&data, 16).unwrap();

        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].len(), 16);
        assert_eq!(slices[1].len(), 16);
    }

    #[test]
    fn test_empty_payload_is_one_slice() {
        let slices = split(b"", DEFAULT_UNIT_SIZE).unwrap();
        assert_eq!(slices.len(), 1);
        assert!(slices[0].is_empty());
        assert_eq!(unit_count(0, DEFAULT_UNIT_SIZE), 1);
    }

    #[test]
    fn test_small_payload_is_atomic() {
        let data = b"small";
        assert!(is_atomic(data.len(), DEFAULT_UNIT_SIZE));
        assert!(is_atomic(DEFAULT_UNIT_SIZE, DEFAULT_UNIT_SIZE));
        assert!(!is_atomic(DEFAULT_UNIT_SIZE + 1, DEFAULT_UNIT_SIZE));

        let slices = split(data, DEFAULT_UNIT_SIZE).unwrap();
        assert_eq!(slices, vec![&data[..]]);
    }

    #[test]
    fn test_one_mib_is_four_units() {
        let data = vec![0x42u8; 1024 * 1024];
        let slices = split(&data, DEFAULT_UNIT_SIZE).unwrap();
        assert_eq!(slices.len(), 4);
    }

    #[test]
    fn test_zero_unit_size_rejected() {
        assert!(matches!(split(b"abc", 0), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_default_unit_fits_default_ceiling() {
        assert_eq!(DEFAULT_UNIT_SIZE % 3, 0);
        assert!(estimated_frame_len(DEFAULT_UNIT_SIZE).unwrap() < DEFAULT_MAX_FRAME_LEN);
    }

    #[test]
    fn test_joined_slices_decode_to_payload() {
        let data: Vec<u8> = (0..2 * DEFAULT_UNIT_SIZE + 10).map(|i| (i % 251) as u8).collect();
        let slices = split(&data, DEFAULT_UNIT_SIZE).unwrap();
        assert_eq!(slices.len(), 3);

        let encoded: Vec<String> = slices.iter().map(|s| encode_bytes(s)).collect();
        assert!(encoded[..2].iter().all(|e| e.len() % 4 == 0));

        // Per-slice decoding and join-then-decode agree.
        let per_slice: Vec<u8> = encoded
            .iter()
            .flat_map(|e| decode_bytes(e).unwrap())
            .collect();
        assert_eq!(per_slice, data);
        assert_eq!(decode_bytes(&encoded.concat()).unwrap(), data);
    }

    #[test]
    fn test_max_unit_for_frame_is_tight() {
        for ceiling in [20_000usize, 100_000, DEFAULT_MAX_FRAME_LEN] {
            let unit = max_unit_for_frame(ceiling).unwrap();
            assert_eq!(unit % 3, 0, "ceiling {}", ceiling);
            assert!(estimated_frame_len(unit).unwrap() <= ceiling, "ceiling {}", ceiling);
            assert!(estimated_frame_len(unit + 16).unwrap() > ceiling, "ceiling {}", ceiling);
        }
    }

    #[test]
    fn test_huge_sizes_do_not_overflow() {
        assert_eq!(estimated_frame_len(usize::MAX), None);
        assert!(estimated_frame_len(usize::MAX / 2).unwrap() > DEFAULT_MAX_FRAME_LEN);
        assert_eq!(unit_count(usize::MAX, usize::MAX / 2), 3);
        assert_eq!(unit_count(usize::MAX, 1), usize::MAX);

        let unit = max_unit_for_frame(usize::MAX).unwrap();
        assert_eq!(unit % 3, 0);
        assert!(estimated_frame_len(unit).is_some());
    }

    #[test]
    fn test_tiny_ceiling_has_no_unit() {
        assert_eq!(max_unit_for_frame(10), None);
        assert_eq!(max_unit_for_frame(OUTER_OVERHEAD + 100), None);
    }
}
