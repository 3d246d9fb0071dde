//! Linear vesting curve.

use serde::{Deserialize, Serialize};

use crate::constants::SCALE;
use crate::error::VestingError;
use crate::math::mul_div;
use crate::types::{IndexAdjusted, Timestamp};

/// Fraction of a window elapsed at `now`, scaled by `SCALE`.
///
/// Returns `SCALE` on or after `start + length` and zero before `start`.
/// `length` must be non-zero; `VestingWindow::new` enforces that.
pub fn vested_fraction(now: Timestamp, start: Timestamp, length: u64) -> u128 {
    let elapsed = (now as i128) - (start as i128);
    if elapsed <= 0 {
        return 0;
    }
    let elapsed = elapsed as u128;
    let length = length as u128;
    if elapsed >= length {
        return SCALE;
    }
    // elapsed < length <= u64::MAX, so SCALE * elapsed fits in u128.
    SCALE * elapsed / length
}

/// A linear vesting window starting at `start` and fully vested
/// `length` seconds later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingWindow {
    pub start: Timestamp,
    pub length: u64,
}

impl VestingWindow {
    pub fn new(start: Timestamp, length: u64) -> Result<Self, VestingError> {
        if length == 0 {
            return Err(VestingError::InvalidVestingLength);
        }
        if start.checked_add_unsigned(length).is_none() {
            return Err(VestingError::ArithmeticOverflow);
        }
        Ok(Self { start, length })
    }

    /// Window between two absolute timestamps, fully vested at `end`.
    pub fn between(start: Timestamp, end: Timestamp) -> Result<Self, VestingError> {
        if end <= start {
            return Err(VestingError::InvalidVestingLength);
        }
        Self::new(start, end.abs_diff(start))
    }

    pub fn end(&self) -> Timestamp {
        self.start.saturating_add_unsigned(self.length)
    }

    pub fn fraction_at(&self, now: Timestamp) -> u128 {
        vested_fraction(now, self.start, self.length)
    }

    pub fn is_fully_vested(&self, now: Timestamp) -> bool {
        now >= self.end()
    }

    /// Portion of `total` vested at `now`, floored.
    pub fn vested(&self, total: IndexAdjusted, now: Timestamp) -> Result<IndexAdjusted, VestingError> {
        mul_div(total.get(), self.fraction_at(now), SCALE).map(IndexAdjusted::new)
    }
}
