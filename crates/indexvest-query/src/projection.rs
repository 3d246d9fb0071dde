//! Projected release schedule.
//!
//! Samples the linear vesting curve at `steps + 1` evenly spaced instants,
//! from the window start through its end, under a fixed index. Each point
//! is what would be vested at that instant with nothing claimed yet.

use indexvest_core::curve::VestingWindow;
use indexvest_core::error::VestingError;
use indexvest_core::index::from_index_adjusted;
use indexvest_core::math::mul_div;
use indexvest_core::types::{Index, IndexAdjusted, StaticAmount, Timestamp};
use serde::Serialize;

/// One sample of a release curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReleasePoint {
    pub at: Timestamp,
    /// Vested fraction scaled by `SCALE`.
    pub fraction: u128,
    pub vested: IndexAdjusted,
    /// `vested` priced at the projection's index.
    pub vested_static: StaticAmount,
}

/// Most samples one projection may take.
pub const MAX_PROJECTION_STEPS: u32 = 10_000;

pub fn release_projection(
    entitlement: IndexAdjusted,
    window: &VestingWindow,
    index: Index,
    steps: u32,
) -> Result<Vec<ReleasePoint>, VestingError> {
    if steps == 0 {
        return Err(VestingError::InvalidConfig("projection needs at least one step".into()));
    }
    if steps > MAX_PROJECTION_STEPS {
        return Err(VestingError::InvalidConfig(format!(
            "projection allows at most {MAX_PROJECTION_STEPS} steps, got {steps}"
        )));
    }

    let mut points = Vec::with_capacity(steps as usize + 1);
    for k in 0..=steps {
        let offset = mul_div(window.length as u128, k as u128, steps as u128)?;
        let at = i64::try_from(offset)
            .ok()
            .and_then(|o| window.start.checked_add(o))
            .ok_or(VestingError::ArithmeticOverflow)?;
        let vested = window.vested(entitlement, at)?;
        points.push(ReleasePoint {
            at,
            fraction: window.fraction_at(at),
            vested,
            vested_static: from_index_adjusted(vested, index)?,
        });
    }
    Ok(points)
}
