use std::sync::Arc;

use indexvest_core::authority::Authority;
use indexvest_core::config::SupplyLedgerConfig;
use indexvest_core::constants::{META_TOTAL_ALLOCATED, SCALE};
use indexvest_core::curve::VestingWindow;
use indexvest_core::error::VestingError;
use indexvest_core::index::{from_index_adjusted, to_index_adjusted};
use indexvest_core::math::mul_div;
use indexvest_core::term::{SupplyTerm, TermRecord};
use indexvest_core::types::{AccountId, Balance, Index, Percent, StaticAmount, Timestamp};
use tracing::{debug, error, info, warn};

use crate::assets::SupplyAssets;
use crate::db::{StagedMutations, StateDb};
use crate::migration;

// ── SupplyVestingEngine ───────────────────────────────────────────────────────

/// Ledger of percent-of-supply shares vesting over one shared window.
///
/// A share's whole entitlement is re-derived on every read from the claim
/// asset's current total supply, so it grows as the supply grows. Claims are
/// bought: the beneficiary pays the payment asset into the treasury, which
/// mints the claim asset at its reserve backing ratio.
pub struct SupplyVestingEngine {
    db: Arc<StateDb>,
    config: SupplyLedgerConfig,
    authority: Authority,
    window: VestingWindow,
    assets: SupplyAssets,
}

impl SupplyVestingEngine {
    pub fn new(
        db: Arc<StateDb>,
        config: SupplyLedgerConfig,
        assets: SupplyAssets,
    ) -> Result<Self, VestingError> {
        config.validate()?;
        let window = config.window()?;
        db.bind_kind(SupplyTerm::KIND)?;
        let authority = config.authority();
        Ok(Self { db, config, authority, window, assets })
    }

    pub fn config(&self) -> &SupplyLedgerConfig {
        &self.config
    }

    pub fn window(&self) -> VestingWindow {
        self.window
    }

    pub fn db(&self) -> &Arc<StateDb> {
        &self.db
    }

    pub fn index(&self) -> Index {
        self.assets.index.index()
    }

    /// Current total supply of the claim asset.
    pub fn supply(&self) -> StaticAmount {
        StaticAmount::new(self.assets.claim.total_supply())
    }

    // ── Views ─────────────────────────────────────────────────────────────────

    pub fn term_of(&self, who: &AccountId) -> Result<Option<SupplyTerm>, VestingError> {
        self.db.get_term(who)
    }

    pub fn terms(&self) -> Result<Vec<(AccountId, SupplyTerm)>, VestingError> {
        self.db.iter_terms()
    }

    pub fn pending_wallet_change(&self, old: &AccountId) -> Result<Option<AccountId>, VestingError> {
        self.db.get_wallet_change(old)
    }

    /// Running sum of every granted percent.
    pub fn total_allocated(&self) -> Result<Percent, VestingError> {
        Ok(self.db.get_meta(META_TOTAL_ALLOCATED)?.unwrap_or(Percent::ZERO))
    }

    pub fn redeemable(&self, who: &AccountId, now: Timestamp) -> Result<StaticAmount, VestingError> {
        match self.db.get_term::<SupplyTerm>(who)? {
            Some(term) => self.redeemable_of(&term, self.index(), now),
            None => Ok(StaticAmount::ZERO),
        }
    }

    fn redeemable_of(
        &self,
        term: &SupplyTerm,
        index: Index,
        now: Timestamp,
    ) -> Result<StaticAmount, VestingError> {
        let supply = self.supply();
        let unclaimed = term.unclaimed_vested(supply, index, &self.window, now)?;
        let amount = from_index_adjusted(unclaimed, index)?;
        debug!(
            supply = supply.get(),
            percent = %term.percent,
            unclaimed = unclaimed.get(),
            amount = amount.get(),
            "supply redeemable"
        );
        Ok(amount)
    }

    /// Claim asset bought by `payment` at the treasury's current backing ratio.
    pub fn quote(&self, payment: Balance) -> Result<StaticAmount, VestingError> {
        let ratio = self.assets.treasury.reserve_backing_ratio();
        if ratio == 0 {
            return Err(VestingError::InvalidConfig("treasury backing ratio is zero".into()));
        }
        Ok(StaticAmount::new(mul_div(payment, SCALE, ratio)?))
    }

    // ── Grant issuance ────────────────────────────────────────────────────────

    /// Grant `beneficiary` a `percent` share of supply. Authority only; one
    /// grant per beneficiary; the running total may not pass the ceiling.
    pub fn issue_grant(
        &mut self,
        caller: &AccountId,
        beneficiary: &AccountId,
        percent: Percent,
    ) -> Result<SupplyTerm, VestingError> {
        self.try_issue_grant(caller, beneficiary, percent)
            .map_err(|e| rejected("issue_grant", caller, e))
    }

    fn try_issue_grant(
        &mut self,
        caller: &AccountId,
        beneficiary: &AccountId,
        percent: Percent,
    ) -> Result<SupplyTerm, VestingError> {
        self.authority.ensure(caller)?;
        if percent.is_zero() {
            return Err(VestingError::ZeroAmount);
        }
        if self.db.has_term::<SupplyTerm>(beneficiary)? {
            return Err(VestingError::DuplicateGrant(beneficiary.to_string()));
        }

        let ceiling = self.config.max_allocation;
        let attempted = self.total_allocated()?.get() as u64 + percent.get() as u64;
        if attempted > ceiling.get() as u64 {
            return Err(VestingError::AllocationCeilingExceeded {
                ceiling: ceiling.get(),
                attempted,
            });
        }
        // Fits in u32: bounded by the ceiling, which is at most 100%.
        let total = Percent::new(attempted as u32);

        let term = SupplyTerm::new(percent);
        let mut staged = StagedMutations::<SupplyTerm>::default();
        staged.terms.push((beneficiary.clone(), term.clone()));
        staged.put_meta(META_TOTAL_ALLOCATED, &total)?;
        self.db.commit(&staged)?;

        info!(
            beneficiary = %beneficiary,
            percent = %percent,
            total_allocated = %total,
            ceiling = %ceiling,
            "supply grant issued"
        );
        Ok(term)
    }

    // ── Claims ────────────────────────────────────────────────────────────────

    /// Pay `payment` into the treasury and mint the bought claim asset to
    /// `recipient`, out of `caller`'s vested share. Returns the minted amount.
    ///
    /// The minted amount is quoted and checked against the vested balance
    /// before any asset moves; a rejected claim takes no payment.
    pub fn claim(
        &mut self,
        caller: &AccountId,
        recipient: &AccountId,
        payment: Balance,
        now: Timestamp,
    ) -> Result<StaticAmount, VestingError> {
        self.try_claim(caller, recipient, payment, now)
            .map_err(|e| rejected("claim", caller, e))
    }

    fn try_claim(
        &mut self,
        caller: &AccountId,
        recipient: &AccountId,
        payment: Balance,
        now: Timestamp,
    ) -> Result<StaticAmount, VestingError> {
        if payment == 0 {
            return Err(VestingError::ZeroAmount);
        }
        let amount = self.quote(payment)?;
        if amount.is_zero() {
            return Err(VestingError::ZeroAmount);
        }

        let index = self.index();
        let term = self.db.get_term::<SupplyTerm>(caller)?;
        let redeemable = match &term {
            Some(t) => self.redeemable_of(t, index, now)?,
            None => StaticAmount::ZERO,
        };
        let mut term = match term {
            Some(t) if amount <= redeemable => t,
            _ => {
                return Err(VestingError::InsufficientVested {
                    requested: amount.get(),
                    redeemable: redeemable.get(),
                })
            }
        };

        let charged = to_index_adjusted(amount, index)?;
        if charged.is_zero() {
            return Err(VestingError::ZeroAmount);
        }
        let have = self.assets.payment.balance_of(caller);
        if have < payment {
            return Err(VestingError::InsufficientBalance { need: payment, have });
        }
        let previous = term.clone();
        term.record_claim(charged)?;

        let mut staged = StagedMutations::<SupplyTerm>::default();
        staged.terms.push((caller.clone(), term.clone()));
        self.db.commit(&staged)?;

        if let Err(e) = self.settle(caller, recipient, payment, amount) {
            self.revert_term(caller, &previous);
            return Err(e);
        }

        info!(
            beneficiary = %caller,
            recipient = %recipient,
            payment,
            minted = amount.get(),
            index_adjusted = charged.get(),
            claimed_total = term.index_adjusted_claimed.get(),
            "supply claim minted"
        );
        Ok(amount)
    }

    // ── Migration ─────────────────────────────────────────────────────────────

    pub fn push_wallet_change(&mut self, caller: &AccountId, new_wallet: &AccountId) -> Result<(), VestingError> {
        migration::push_wallet_change::<SupplyTerm>(&self.db, caller, new_wallet)
            .map_err(|e| rejected("push_wallet_change", caller, e))
    }

    pub fn pull_wallet_change(&mut self, caller: &AccountId, old: &AccountId) -> Result<SupplyTerm, VestingError> {
        migration::pull_wallet_change::<SupplyTerm>(&self.db, caller, old)
            .map_err(|e| rejected("pull_wallet_change", caller, e))
    }

    // ── Effect compensation ───────────────────────────────────────────────────

    /// Take `payment` into the treasury and mint `amount` to `recipient`. A
    /// failed mint hands the payment back.
    fn settle(
        &self,
        caller: &AccountId,
        recipient: &AccountId,
        payment: Balance,
        amount: StaticAmount,
    ) -> Result<(), VestingError> {
        let treasury = &self.config.treasury;
        self.assets.payment.transfer(caller, treasury, payment)?;
        if let Err(e) = self.assets.treasury.mint(recipient, amount) {
            if let Err(refund) = self.assets.payment.transfer(treasury, caller, payment) {
                error!(caller = %caller, payment, error = %refund, "claim payment refund failed");
            }
            return Err(e);
        }
        Ok(())
    }

    fn revert_term(&self, who: &AccountId, previous: &SupplyTerm) {
        if let Err(e) = self.db.restore_term(who, Some(previous)) {
            error!(account = %who, error = %e, "term revert failed");
        }
    }
}

fn rejected(op: &'static str, caller: &AccountId, e: VestingError) -> VestingError {
    warn!(op, caller = %caller, error = %e, "operation rejected");
    e
}
