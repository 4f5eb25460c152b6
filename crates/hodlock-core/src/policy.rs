//! Lock-height policy: maps wall-clock time to a target block height a
//! fixed number of years ahead.
//!
//! Heights are approximated from the UNIX clock at one block per
//! [`BLOCK_INTERVAL_SECS`]. The approximation drifts from the real chain
//! by the cumulative historical deviation from ten-minute blocks; the drift
//! is left uncorrected so that the same `now` always yields the same height.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::error::CoreError;
use crate::types::BlockHeight;

/// Average block interval assumed by the policy.
pub const BLOCK_INTERVAL_SECS: u64 = 600;

/// 6 blocks per hour, 24 hours, 365 days.
pub const BLOCKS_PER_YEAR: u32 = 365 * 24 * (3600 / BLOCK_INTERVAL_SECS as u32);

pub const DEFAULT_LOCK_YEARS: u32 = 99;

/// Locktime values at or above this are read as UNIX timestamps by
/// consensus, so a height-based lock must stay strictly below it.
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// Approximate chain height at `now`. Instants before the epoch map to 0.
pub fn approx_height(now: SystemTime) -> Result<BlockHeight, CoreError> {
    let secs = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    u32::try_from(secs / BLOCK_INTERVAL_SECS)
        .map(BlockHeight)
        .map_err(|_| CoreError::Validation(format!("clock value {secs}s is out of range")))
}

/// Height `duration_years` ahead of the approximate height at `now`.
pub fn target_height(now: SystemTime, duration_years: u32) -> Result<BlockHeight, CoreError> {
    if duration_years == 0 {
        return Err(CoreError::Validation(
            "lock duration must be at least one year".to_owned(),
        ));
    }

    let current = approx_height(now)?;
    let target = duration_years
        .checked_mul(BLOCKS_PER_YEAR)
        .and_then(|blocks| current.checked_add(blocks))
        .filter(|h| **h < LOCKTIME_THRESHOLD)
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "a {duration_years}-year lock exceeds the block-height locktime range"
            ))
        })?;
    Ok(target)
}

/// Configured lock duration. Validated once at construction so callers
/// cannot hold a zero-year policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LockPolicy {
    duration_years: u32,
}

impl LockPolicy {
    pub fn new(duration_years: u32) -> Result<Self, CoreError> {
        // Check against the current clock so an out-of-range duration fails
        // at startup instead of on the first lock.
        target_height(SystemTime::now(), duration_years)?;
        Ok(Self { duration_years })
    }

    pub fn duration_years(&self) -> u32 {
        self.duration_years
    }

    pub fn target_height(&self, now: SystemTime) -> Result<BlockHeight, CoreError> {
        target_height(now, self.duration_years)
    }
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            duration_years: DEFAULT_LOCK_YEARS,
        }
    }
}
