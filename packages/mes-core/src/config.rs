//! Transfer configuration.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::transfer::chunking::{
    estimated_frame_len, max_unit_for_frame, DEFAULT_MAX_FRAME_LEN, DEFAULT_UNIT_SIZE,
};
use crate::transfer::reassembly::DEFAULT_COMPLETED_MEMORY;

/// Tunables of a [`TransferSession`](crate::transfer::TransferSession)
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Raw bytes per unit; payloads up to this size are sent atomically
    pub unit_size: usize,
    /// Largest frame the relay accepts, in characters
    pub max_frame_len: usize,
    /// Await transport readiness every this many units (0 disables)
    pub pace_every: u32,
    /// Extra pause at each readiness checkpoint
    pub pace_delay: Duration,
    /// Idle age after which incomplete inbound transfers are purged
    pub stale_after: Duration,
    /// Completed transfer ids remembered to suppress late duplicates
    pub completed_memory: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            unit_size: DEFAULT_UNIT_SIZE,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            pace_every: 8,
            pace_delay: Duration::ZERO,
            stale_after: Duration::from_secs(10 * 60),
            completed_memory: DEFAULT_COMPLETED_MEMORY,
        }
    }
}

impl TransferConfig {
    /// Defaults with the largest unit size that fits `max_frame_len`
    pub fn for_frame_ceiling(max_frame_len: usize) -> Result<Self> {
        let unit_size = max_unit_for_frame(max_frame_len).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "frame ceiling of {} leaves no room for payload",
                max_frame_len
            ))
        })?;
        Ok(Self {
            unit_size,
            max_frame_len,
            ..Self::default()
        })
    }

    /// Check that a full unit still fits in one relay frame
    pub fn validate(&self) -> Result<()> {
        if self.unit_size == 0 {
            return Err(Error::InvalidConfig("unit size must be > 0".into()));
        }
        let frame_len = estimated_frame_len(self.unit_size).ok_or_else(|| {
            Error::InvalidConfig(format!("unit size {} is too large", self.unit_size))
        })?;
        if frame_len > self.max_frame_len {
            return Err(Error::InvalidConfig(format!(
                "unit size {} produces frames of up to {} characters, ceiling is {}",
                self.unit_size, frame_len, self.max_frame_len
            )));
        }
        Ok(())
    }
}
