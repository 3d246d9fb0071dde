use std::fmt;

use indexvest_core::constants::META_TOTAL_ALLOCATED;
use indexvest_core::error::VestingError;
use indexvest_core::types::{Index, IndexAdjusted, Percent, StaticAmount, Timestamp};
use indexvest_state::StateDb;
use serde::Serialize;
use tracing::debug;

use crate::query::{Schedule, Snapshot, TermStatus};

/// Ledger-wide totals at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub kind: &'static str,
    pub terms: usize,
    pub exhausted: usize,
    pub total_entitlement: IndexAdjusted,
    pub total_claimed: IndexAdjusted,
    pub total_redeemable: StaticAmount,
    pub index: Index,
    /// Allocation ledger of a supply ledger; absent for fixed grants.
    pub total_allocated: Option<Percent>,
}

impl LedgerSummary {
    pub fn collect<T: Schedule>(
        db: &StateDb,
        snapshot: &Snapshot,
        now: Timestamp,
    ) -> Result<Self, VestingError> {
        let mut summary = Self {
            kind: T::KIND,
            terms: 0,
            exhausted: 0,
            total_entitlement: IndexAdjusted::ZERO,
            total_claimed: IndexAdjusted::ZERO,
            total_redeemable: StaticAmount::ZERO,
            index: snapshot.index,
            total_allocated: db.get_meta(META_TOTAL_ALLOCATED)?,
        };

        for (_, term) in db.iter_terms::<T>()? {
            let status = TermStatus::evaluate(&term, snapshot, now)?;
            summary.terms += 1;
            if status.is_exhausted() {
                summary.exhausted += 1;
            }
            summary.total_entitlement = summary.total_entitlement.checked_add(status.entitlement)?;
            summary.total_claimed = summary.total_claimed.checked_add(status.claimed)?;
            summary.total_redeemable = summary.total_redeemable.checked_add(status.redeemable)?;
        }

        debug!(kind = summary.kind, terms = summary.terms, "ledger summary collected");
        Ok(summary)
    }
}

impl fmt::Display for LedgerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ledger:            {}", self.kind)?;
        writeln!(f, "Index:             {}", self.index)?;
        writeln!(f, "Terms:             {} ({} fully claimed)", self.terms, self.exhausted)?;
        writeln!(f, "Entitled (adj):    {}", self.total_entitlement)?;
        writeln!(f, "Claimed (adj):     {}", self.total_claimed)?;
        write!(f, "Redeemable now:    {}", self.total_redeemable)?;
        if let Some(p) = self.total_allocated {
            write!(f, "\nAllocated:         {p}")?;
        }
        Ok(())
    }
}
