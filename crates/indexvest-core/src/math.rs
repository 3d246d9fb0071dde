//! Overflow-checked fixed-point helpers.
//!
//! Products of two 18-decimal quantities overflow `u128` long before the
//! amounts themselves do, so every `a * b / d` goes through a 256-bit
//! intermediate and floors once at the end.

use primitive_types::U256;

use crate::error::VestingError;

/// floor(a * b / d). Fails if `d` is zero or the quotient exceeds `u128`.
pub fn mul_div(a: u128, b: u128, d: u128) -> Result<u128, VestingError> {
    if d == 0 {
        return Err(VestingError::ArithmeticOverflow);
    }
    let q = U256::from(a) * U256::from(b) / U256::from(d);
    if q > U256::from(u128::MAX) {
        return Err(VestingError::ArithmeticOverflow);
    }
    Ok(q.low_u128())
}
