//! Index converter.
//!
//! `to_index_adjusted(x)   = x * SCALE / index`
//! `from_index_adjusted(x) = x * index / SCALE`
//!
//! Both directions floor. A round trip can lose a unit but never gains one,
//! so claims are only ever under-credited.

use crate::constants::SCALE;
use crate::error::VestingError;
use crate::math::mul_div;
use crate::types::{Index, IndexAdjusted, StaticAmount};

pub fn to_index_adjusted(amount: StaticAmount, index: Index) -> Result<IndexAdjusted, VestingError> {
    if index.get() == 0 {
        return Err(VestingError::ZeroIndex);
    }
    mul_div(amount.get(), SCALE, index.get()).map(IndexAdjusted::new)
}

pub fn from_index_adjusted(
    amount: IndexAdjusted,
    index: Index,
) -> Result<StaticAmount, VestingError> {
    mul_div(amount.get(), index.get(), SCALE).map(StaticAmount::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(num: u128, den: u128) -> Index {
        Index::new(SCALE * num / den)
    }

    #[test]
    fn identity_at_initial_index() {
        let x = StaticAmount::new(1_000);
        let ia = to_index_adjusted(x, Index::default()).unwrap();
        assert_eq!(ia.get(), 1_000);
        assert_eq!(from_index_adjusted(ia, Index::default()).unwrap(), x);
    }

    #[test]
    fn higher_index_shrinks_adjusted_amount() {
        let ia = to_index_adjusted(StaticAmount::new(1_000), idx(2, 1)).unwrap();
        assert_eq!(ia.get(), 500);
        assert_eq!(from_index_adjusted(ia, idx(3, 1)).unwrap().get(), 1_500);
    }

    #[test]
    fn round_trip_never_gains() {
        let index = idx(3, 2);
        for raw in [0u128, 1, 2, 3, 7, 999, 1_000_001, 123_456_789_012_345] {
            let x = StaticAmount::new(raw);
            let back = from_index_adjusted(to_index_adjusted(x, index).unwrap(), index).unwrap();
            assert!(back <= x, "{raw} came back as {}", back.get());
            assert!(x.get() - back.get() <= 1, "{raw} lost more than one unit");
        }
    }

    #[test]
    fn round_trip_can_lose_a_unit() {
        // 1 * 1e18 / 1.5e18 floors to 0.
        let index = idx(3, 2);
        let ia = to_index_adjusted(StaticAmount::new(1), index).unwrap();
        assert_eq!(ia, IndexAdjusted::ZERO);
    }

    #[test]
    fn zero_index_rejected() {
        assert!(matches!(
            to_index_adjusted(StaticAmount::new(1), Index::new(0)),
            Err(VestingError::ZeroIndex)
        ));
    }
}
