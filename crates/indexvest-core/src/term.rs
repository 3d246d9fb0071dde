use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::PERCENT_SCALE;
use crate::curve::VestingWindow;
use crate::error::VestingError;
use crate::index::to_index_adjusted;
use crate::math::mul_div;
use crate::types::{Index, IndexAdjusted, Percent, StaticAmount, Timestamp};

/// A per-beneficiary ledger record as persisted in the `terms` tree.
///
/// A record with no entitlement is indistinguishable from no record.
pub trait TermRecord: Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug {
    /// Schedule variant tag stored alongside the terms.
    const KIND: &'static str;

    fn has_entitlement(&self) -> bool;

    fn index_adjusted_claimed(&self) -> IndexAdjusted;
}

// ── Fixed grant ───────────────────────────────────────────────────────────────

/// Fixed-total grant with its own vesting window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedTerm {
    /// Running total already withdrawn. Never decreases.
    pub index_adjusted_claimed: IndexAdjusted,
    /// Whole entitlement, converted at the index of the grant.
    pub total_index_adjusted: IndexAdjusted,
    pub start_vest: Timestamp,
    pub end_vest: Timestamp,
    pub vest_length: u64,
}

impl FixedTerm {
    pub fn new(total: IndexAdjusted, window: VestingWindow) -> Self {
        Self {
            index_adjusted_claimed: IndexAdjusted::ZERO,
            total_index_adjusted: total,
            start_vest: window.start,
            end_vest: window.end(),
            vest_length: window.length,
        }
    }

    pub fn window(&self) -> Result<VestingWindow, VestingError> {
        VestingWindow::new(self.start_vest, self.vest_length)
    }

    /// Vested but not yet claimed, in index-adjusted units. Zero rather than
    /// negative when rounding has put claims ahead of the curve.
    pub fn unclaimed_vested(&self, now: Timestamp) -> Result<IndexAdjusted, VestingError> {
        let vested = self.window()?.vested(self.total_index_adjusted, now)?;
        Ok(vested.saturating_sub(self.index_adjusted_claimed))
    }

    pub fn record_claim(&mut self, claimed: IndexAdjusted) -> Result<(), VestingError> {
        self.index_adjusted_claimed = self.index_adjusted_claimed.checked_add(claimed)?;
        Ok(())
    }

    pub fn is_exhausted(&self) -> bool {
        self.index_adjusted_claimed >= self.total_index_adjusted
    }
}

impl TermRecord for FixedTerm {
    const KIND: &'static str = crate::constants::LEDGER_KIND_FIXED;

    fn has_entitlement(&self) -> bool {
        !self.total_index_adjusted.is_zero()
    }

    fn index_adjusted_claimed(&self) -> IndexAdjusted {
        self.index_adjusted_claimed
    }
}

// ── Supply share ──────────────────────────────────────────────────────────────

/// Percent-of-supply share vesting over the ledger-wide window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyTerm {
    pub percent: Percent,
    pub index_adjusted_claimed: IndexAdjusted,
}

impl SupplyTerm {
    pub fn new(percent: Percent) -> Self {
        Self { percent, index_adjusted_claimed: IndexAdjusted::ZERO }
    }

    /// Whole entitlement against the current supply, in index-adjusted units.
    pub fn entitlement(
        &self,
        supply: StaticAmount,
        index: Index,
    ) -> Result<IndexAdjusted, VestingError> {
        let share = mul_div(supply.get(), self.percent.get() as u128, PERCENT_SCALE as u128)?;
        to_index_adjusted(StaticAmount::new(share), index)
    }

    pub fn unclaimed_vested(
        &self,
        supply: StaticAmount,
        index: Index,
        window: &VestingWindow,
        now: Timestamp,
    ) -> Result<IndexAdjusted, VestingError> {
        let vested = window.vested(self.entitlement(supply, index)?, now)?;
        Ok(vested.saturating_sub(self.index_adjusted_claimed))
    }

    pub fn record_claim(&mut self, claimed: IndexAdjusted) -> Result<(), VestingError> {
        self.index_adjusted_claimed = self.index_adjusted_claimed.checked_add(claimed)?;
        Ok(())
    }
}

impl TermRecord for SupplyTerm {
    const KIND: &'static str = crate::constants::LEDGER_KIND_SUPPLY;

    fn has_entitlement(&self) -> bool {
        !self.percent.is_zero()
    }

    fn index_adjusted_claimed(&self) -> IndexAdjusted {
        self.index_adjusted_claimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ONE_PERCENT, SCALE};

    #[test]
    fn fixed_term_window_matches_grant() {
        let w = VestingWindow::new(100, 1_000).unwrap();
        let t = FixedTerm::new(IndexAdjusted::new(1_000), w);
        assert_eq!(t.end_vest, 1_100);
        assert_eq!(t.window().unwrap(), w);
    }

    #[test]
    fn fixed_term_unclaimed_clamps() {
        let w = VestingWindow::new(0, 1_000).unwrap();
        let mut t = FixedTerm::new(IndexAdjusted::new(1_000), w);
        t.record_claim(IndexAdjusted::new(600)).unwrap();
        assert_eq!(t.unclaimed_vested(500).unwrap(), IndexAdjusted::ZERO);
        assert_eq!(t.unclaimed_vested(1_000).unwrap().get(), 400);
    }

    #[test]
    fn supply_entitlement_tracks_supply() {
        let t = SupplyTerm::new(Percent::new(10 * ONE_PERCENT));
        let index = Index::new(SCALE);
        assert_eq!(
            t.entitlement(StaticAmount::new(1_000_000), index).unwrap().get(),
            100_000
        );
        assert_eq!(
            t.entitlement(StaticAmount::new(2_000_000), index).unwrap().get(),
            200_000
        );
    }

    #[test]
    fn empty_terms_have_no_entitlement() {
        assert!(!SupplyTerm::new(Percent::ZERO).has_entitlement());
        let w = VestingWindow::new(0, 1).unwrap();
        assert!(!FixedTerm::new(IndexAdjusted::ZERO, w).has_entitlement());
    }
}
