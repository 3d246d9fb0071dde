use chrono::{DateTime, Utc};
use indexvest_core::constants::SCALE;
use indexvest_core::curve::VestingWindow;
use indexvest_core::error::VestingError;
use indexvest_core::index::from_index_adjusted;
use indexvest_core::term::{FixedTerm, SupplyTerm, TermRecord};
use indexvest_core::types::{AccountId, Index, IndexAdjusted, StaticAmount, Timestamp};
use indexvest_state::{FixedVestingEngine, StateDb, SupplyVestingEngine};
use serde::Serialize;

use crate::projection::{release_projection, ReleasePoint};

// ── Snapshot ──────────────────────────────────────────────────────────────────

/// Ledger-wide inputs a term is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub index: Index,
    /// Claim-asset supply. Only supply shares read it.
    pub supply: StaticAmount,
    /// Shared window of a supply ledger. Fixed terms carry their own.
    pub window: Option<VestingWindow>,
}

impl Snapshot {
    pub fn of_fixed(engine: &FixedVestingEngine) -> Self {
        Self { index: engine.index(), supply: StaticAmount::ZERO, window: None }
    }

    pub fn of_supply(engine: &SupplyVestingEngine) -> Self {
        Self {
            index: engine.index(),
            supply: engine.supply(),
            window: Some(engine.window()),
        }
    }
}

/// A stored term that can be placed on a vesting curve.
pub trait Schedule: TermRecord {
    fn window_in(&self, snapshot: &Snapshot) -> Result<VestingWindow, VestingError>;

    /// Whole entitlement in index-adjusted units under `snapshot`.
    fn entitlement_in(&self, snapshot: &Snapshot) -> Result<IndexAdjusted, VestingError>;
}

impl Schedule for FixedTerm {
    fn window_in(&self, _snapshot: &Snapshot) -> Result<VestingWindow, VestingError> {
        self.window()
    }

    fn entitlement_in(&self, _snapshot: &Snapshot) -> Result<IndexAdjusted, VestingError> {
        Ok(self.total_index_adjusted)
    }
}

impl Schedule for SupplyTerm {
    fn window_in(&self, snapshot: &Snapshot) -> Result<VestingWindow, VestingError> {
        snapshot
            .window
            .ok_or_else(|| VestingError::InvalidConfig("snapshot carries no vesting window".into()))
    }

    fn entitlement_in(&self, snapshot: &Snapshot) -> Result<IndexAdjusted, VestingError> {
        self.entitlement(snapshot.supply, snapshot.index)
    }
}

// ── TermStatus ────────────────────────────────────────────────────────────────

/// One term evaluated at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermStatus {
    pub window: VestingWindow,
    pub entitlement: IndexAdjusted,
    pub vested: IndexAdjusted,
    pub claimed: IndexAdjusted,
    /// Vested fraction scaled by `SCALE`.
    pub fraction: u128,
    pub redeemable: StaticAmount,
}

impl TermStatus {
    pub fn evaluate<T: Schedule>(
        term: &T,
        snapshot: &Snapshot,
        now: Timestamp,
    ) -> Result<Self, VestingError> {
        let window = term.window_in(snapshot)?;
        let entitlement = term.entitlement_in(snapshot)?;
        let vested = window.vested(entitlement, now)?;
        let claimed = term.index_adjusted_claimed();
        let redeemable = from_index_adjusted(vested.saturating_sub(claimed), snapshot.index)?;
        Ok(Self {
            window,
            entitlement,
            vested,
            claimed,
            fraction: window.fraction_at(now),
            redeemable,
        })
    }

    pub fn is_exhausted(&self) -> bool {
        self.claimed >= self.entitlement
    }
}

// ── TermQuery ─────────────────────────────────────────────────────────────────

/// Query helpers for stored terms.
pub struct TermQuery<'a> {
    db: &'a StateDb,
    snapshot: Snapshot,
}

impl<'a> TermQuery<'a> {
    pub fn new(db: &'a StateDb, snapshot: Snapshot) -> Self {
        Self { db, snapshot }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn get<T: Schedule>(&self, who: &AccountId) -> Result<Option<T>, VestingError> {
        self.db.get_term(who)
    }

    fn require<T: Schedule>(&self, who: &AccountId) -> Result<T, VestingError> {
        self.get(who)?
            .ok_or_else(|| VestingError::TermNotFound(who.to_string()))
    }

    pub fn status<T: Schedule>(&self, who: &AccountId, now: Timestamp) -> Result<TermStatus, VestingError> {
        TermStatus::evaluate(&self.require::<T>(who)?, &self.snapshot, now)
    }

    /// Returns true once everything the term is entitled to has been
    /// claimed. A supply share can leave this state again as supply grows.
    pub fn is_exhausted<T: Schedule>(&self, who: &AccountId) -> Result<bool, VestingError> {
        let term = self.require::<T>(who)?;
        Ok(term.index_adjusted_claimed() >= term.entitlement_in(&self.snapshot)?)
    }

    /// Evenly spaced samples of the term's release curve.
    pub fn projection<T: Schedule>(&self, who: &AccountId, steps: u32) -> Result<Vec<ReleasePoint>, VestingError> {
        let term = self.require::<T>(who)?;
        release_projection(
            term.entitlement_in(&self.snapshot)?,
            &term.window_in(&self.snapshot)?,
            self.snapshot.index,
            steps,
        )
    }

    /// Human-readable summary of a term's state.
    pub fn describe<T: Schedule>(&self, who: &AccountId, now: Timestamp) -> Result<String, VestingError> {
        let s = self.status::<T>(who, now)?;

        let phase = if now < s.window.start {
            format!("Not started, vesting begins in {} days", s.window.start.saturating_sub(now) / 86_400)
        } else if s.is_exhausted() {
            "Fully claimed".to_string()
        } else if s.window.is_fully_vested(now) {
            "Fully vested".to_string()
        } else {
            format!("Vesting, fully vested in {} days", s.window.end().saturating_sub(now) / 86_400)
        };

        let b58 = who.to_b58();
        Ok(format!(
            "{} term {} | {} vested | entitled {} / claimed {} index-adjusted | redeemable {} | {} to {} | {}",
            T::KIND,
            &b58[..8.min(b58.len())],
            format_fraction(s.fraction),
            s.entitlement,
            s.claimed,
            s.redeemable,
            format_ts(s.window.start),
            format_ts(s.window.end()),
            phase
        ))
    }
}

/// `SCALE`-based fraction as a percentage with two decimals.
fn format_fraction(fraction: u128) -> String {
    let bps = fraction.min(SCALE) * 10_000 / SCALE;
    format!("{}.{:02}%", bps / 100, bps % 100)
}

fn format_ts(ts: Timestamp) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}
