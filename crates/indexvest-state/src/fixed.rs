use std::sync::Arc;

use indexvest_core::authority::Authority;
use indexvest_core::config::FixedLedgerConfig;
use indexvest_core::curve::VestingWindow;
use indexvest_core::error::VestingError;
use indexvest_core::index::{from_index_adjusted, to_index_adjusted};
use indexvest_core::term::{FixedTerm, TermRecord};
use indexvest_core::types::{AccountId, Index, StaticAmount, Timestamp};
use tracing::{debug, error, info, warn};

use crate::assets::FixedAssets;
use crate::db::{StagedMutations, StateDb};
use crate::migration;

// ── FixedVestingEngine ────────────────────────────────────────────────────────

/// Ledger of fixed-total grants, each with its own vesting window.
///
/// Grants pull the static asset from the authority and stake it into the
/// custody account; claims pay out the staked receipt. Entitlements and
/// claims are stored index-adjusted, so the payout of a fully vested term
/// grows with the index.
pub struct FixedVestingEngine {
    db: Arc<StateDb>,
    config: FixedLedgerConfig,
    authority: Authority,
    assets: FixedAssets,
}

impl FixedVestingEngine {
    pub fn new(
        db: Arc<StateDb>,
        config: FixedLedgerConfig,
        assets: FixedAssets,
    ) -> Result<Self, VestingError> {
        config.validate()?;
        db.bind_kind(FixedTerm::KIND)?;
        let authority = config.authority();
        Ok(Self { db, config, authority, assets })
    }

    pub fn config(&self) -> &FixedLedgerConfig {
        &self.config
    }

    pub fn db(&self) -> &Arc<StateDb> {
        &self.db
    }

    pub fn index(&self) -> Index {
        self.assets.index.index()
    }

    // ── Views ─────────────────────────────────────────────────────────────────

    pub fn term_of(&self, who: &AccountId) -> Result<Option<FixedTerm>, VestingError> {
        self.db.get_term(who)
    }

    pub fn terms(&self) -> Result<Vec<(AccountId, FixedTerm)>, VestingError> {
        self.db.iter_terms()
    }

    pub fn pending_wallet_change(&self, old: &AccountId) -> Result<Option<AccountId>, VestingError> {
        self.db.get_wallet_change(old)
    }

    /// Static amount `who` may claim at `now`, against the current index.
    pub fn redeemable(&self, who: &AccountId, now: Timestamp) -> Result<StaticAmount, VestingError> {
        match self.db.get_term::<FixedTerm>(who)? {
            Some(term) => redeemable_of(&term, self.index(), now),
            None => Ok(StaticAmount::ZERO),
        }
    }

    // ── Grant issuance ────────────────────────────────────────────────────────

    /// Grant `beneficiary` a term worth `amount` of the static asset, vesting
    /// linearly over `vest_length` seconds from `now`. Authority only; one
    /// grant per beneficiary.
    pub fn issue_grant(
        &mut self,
        caller: &AccountId,
        beneficiary: &AccountId,
        amount: StaticAmount,
        vest_length: u64,
        now: Timestamp,
    ) -> Result<FixedTerm, VestingError> {
        self.try_issue_grant(caller, beneficiary, amount, vest_length, now)
            .map_err(|e| rejected("issue_grant", caller, e))
    }

    fn try_issue_grant(
        &mut self,
        caller: &AccountId,
        beneficiary: &AccountId,
        amount: StaticAmount,
        vest_length: u64,
        now: Timestamp,
    ) -> Result<FixedTerm, VestingError> {
        self.authority.ensure(caller)?;
        if amount.is_zero() {
            return Err(VestingError::ZeroAmount);
        }
        if self.db.has_term::<FixedTerm>(beneficiary)? {
            return Err(VestingError::DuplicateGrant(beneficiary.to_string()));
        }
        let window = VestingWindow::new(now, vest_length)?;

        let index = self.index();
        let total = to_index_adjusted(amount, index)?;
        if total.is_zero() {
            return Err(VestingError::ZeroAmount);
        }
        let term = FixedTerm::new(total, window);

        let custody = &self.config.custody;
        let have = self.assets.base.balance_of(caller);
        if have < amount.get() {
            return Err(VestingError::InsufficientBalance { need: amount.get(), have });
        }
        let allowed = self.assets.base.allowance(caller, custody);
        if allowed < amount.get() {
            return Err(VestingError::InsufficientAllowance { need: amount.get(), have: allowed });
        }

        let mut staged = StagedMutations::<FixedTerm>::default();
        staged.terms.push((beneficiary.clone(), term.clone()));
        self.db.commit(&staged)?;

        if let Err(e) = self.fund_grant(caller, amount) {
            self.revert_term(beneficiary, None);
            return Err(e);
        }

        info!(
            beneficiary = %beneficiary,
            amount = amount.get(),
            index_adjusted = total.get(),
            index = %index,
            start = window.start,
            end = window.end(),
            "fixed grant issued"
        );
        Ok(term)
    }

    // ── Claims ────────────────────────────────────────────────────────────────

    /// Pay `amount` of the staked receipt to `recipient` out of `caller`'s
    /// vested balance.
    pub fn claim(
        &mut self,
        caller: &AccountId,
        recipient: &AccountId,
        amount: StaticAmount,
        now: Timestamp,
    ) -> Result<(), VestingError> {
        self.try_claim(caller, recipient, amount, now)
            .map_err(|e| rejected("claim", caller, e))
    }

    fn try_claim(
        &mut self,
        caller: &AccountId,
        recipient: &AccountId,
        amount: StaticAmount,
        now: Timestamp,
    ) -> Result<(), VestingError> {
        if amount.is_zero() {
            return Err(VestingError::ZeroAmount);
        }
        let index = self.index();
        let term = self.db.get_term::<FixedTerm>(caller)?;
        let redeemable = match &term {
            Some(t) => redeemable_of(t, index, now)?,
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

        // Charged from the requested amount, not from `redeemable`. An amount
        // below one index unit would be charged nothing.
        let charged = to_index_adjusted(amount, index)?;
        if charged.is_zero() {
            return Err(VestingError::ZeroAmount);
        }
        let custody = &self.config.custody;
        let held = self.assets.receipt.balance_of(custody);
        if held < amount.get() {
            return Err(VestingError::InsufficientBalance { need: amount.get(), have: held });
        }
        let previous = term.clone();
        term.record_claim(charged)?;

        // Recorded before the payout; a failed payout puts `previous` back.
        let mut staged = StagedMutations::<FixedTerm>::default();
        staged.terms.push((caller.clone(), term.clone()));
        self.db.commit(&staged)?;

        if let Err(e) = self.assets.receipt.transfer(custody, recipient, amount.get()) {
            self.revert_term(caller, Some(&previous));
            return Err(e);
        }

        info!(
            beneficiary = %caller,
            recipient = %recipient,
            amount = amount.get(),
            index_adjusted = charged.get(),
            claimed_total = term.index_adjusted_claimed.get(),
            index = %index,
            "fixed claim paid"
        );
        Ok(())
    }

    // ── Migration ─────────────────────────────────────────────────────────────

    pub fn push_wallet_change(&mut self, caller: &AccountId, new_wallet: &AccountId) -> Result<(), VestingError> {
        migration::push_wallet_change::<FixedTerm>(&self.db, caller, new_wallet)
            .map_err(|e| rejected("push_wallet_change", caller, e))
    }

    pub fn pull_wallet_change(&mut self, caller: &AccountId, old: &AccountId) -> Result<FixedTerm, VestingError> {
        migration::pull_wallet_change::<FixedTerm>(&self.db, caller, old)
            .map_err(|e| rejected("pull_wallet_change", caller, e))
    }

    // ── Effect compensation ───────────────────────────────────────────────────

    /// Pull `amount` from `caller` into custody and stake it. A failed stake
    /// hands the pulled funds back.
    fn fund_grant(&self, caller: &AccountId, amount: StaticAmount) -> Result<(), VestingError> {
        let custody = &self.config.custody;
        self.assets
            .base
            .transfer_from(custody, caller, custody, amount.get())?;
        if let Err(e) = self.assets.staking.stake(custody, custody, amount) {
            if let Err(refund) = self.assets.base.transfer(custody, caller, amount.get()) {
                error!(caller = %caller, amount = amount.get(), error = %refund, "grant refund failed");
            }
            return Err(e);
        }
        Ok(())
    }

    fn revert_term(&self, who: &AccountId, previous: Option<&FixedTerm>) {
        if let Err(e) = self.db.restore_term(who, previous) {
            error!(account = %who, error = %e, "term revert failed");
        }
    }
}

/// Redeemable static amount of `term` at `now` under `index`.
pub fn redeemable_of(term: &FixedTerm, index: Index, now: Timestamp) -> Result<StaticAmount, VestingError> {
    let unclaimed = term.unclaimed_vested(now)?;
    let amount = from_index_adjusted(unclaimed, index)?;
    debug!(unclaimed = unclaimed.get(), amount = amount.get(), index = %index, "fixed redeemable");
    Ok(amount)
}

fn rejected(op: &'static str, caller: &AccountId, e: VestingError) -> VestingError {
    warn!(op, caller = %caller, error = %e, "operation rejected");
    e
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{FungibleAsset, YieldTransform};
    use crate::memory::RebasingToken;
    use crate::db::tests::temp_db;
    use crate::memory::MemoryAssets;
    use indexvest_core::constants::SCALE;
    use indexvest_core::error::ErrorKind;
    use indexvest_core::types::{Balance, IndexAdjusted};

    const T0: Timestamp = 1_700_000_000;

    struct Harness {
        engine: FixedVestingEngine,
        assets: MemoryAssets,
        owner: AccountId,
        custody: AccountId,
    }

    fn harness(name: &str, funding: Balance) -> Harness {
        let owner = AccountId::from_label("owner");
        let custody = AccountId::from_label("custody");
        let assets = MemoryAssets::new();
        assets.base.mint(&owner, funding).unwrap();
        assets.base.approve(&owner, &custody, funding);
        let config = FixedLedgerConfig { authority: owner.clone(), custody: custody.clone() };
        let engine = FixedVestingEngine::new(
            Arc::new(temp_db(&format!("fixed_{name}"))),
            config,
            assets.fixed_assets(),
        )
        .unwrap();
        Harness { engine, assets, owner, custody }
    }

    fn acct(label: &str) -> AccountId {
        AccountId::from_label(label)
    }

    #[test]
    fn halfway_scenario() {
        let mut h = harness("halfway", 1_000);
        let a = acct("alice");
        h.engine
            .issue_grant(&h.owner, &a, StaticAmount::new(1_000), 1_000, T0)
            .unwrap();

        assert_eq!(h.engine.redeemable(&a, T0 + 500).unwrap().get(), 500);
        h.engine.claim(&a, &a, StaticAmount::new(500), T0 + 500).unwrap();
        assert_eq!(h.assets.receipt.balance_of(&a), 500);

        let err = h.engine.claim(&a, &a, StaticAmount::new(1), T0 + 500).unwrap_err();
        assert!(matches!(err, VestingError::InsufficientVested { requested: 1, redeemable: 0 }));
        assert_eq!(err.kind(), ErrorKind::InsufficientVested);
    }

    #[test]
    fn grant_stakes_funding_into_custody() {
        let mut h = harness("custody", 1_000);
        h.engine
            .issue_grant(&h.owner, &acct("alice"), StaticAmount::new(600), 100, T0)
            .unwrap();
        assert_eq!(h.assets.base.balance_of(&h.owner), 400);
        assert_eq!(h.assets.receipt.balance_of(&h.custody), 600);
        assert_eq!(h.assets.receipt.shares_of(&h.custody), IndexAdjusted::new(600));
    }

    #[test]
    fn fully_vested_at_deadline() {
        let mut h = harness("deadline", 1_000);
        let a = acct("alice");
        h.engine
            .issue_grant(&h.owner, &a, StaticAmount::new(1_000), 1_000, T0)
            .unwrap();
        assert_eq!(h.engine.redeemable(&a, T0 + 1_000).unwrap().get(), 1_000);
        assert_eq!(h.engine.redeemable(&a, T0 + 999).unwrap().get(), 999);
    }

    #[test]
    fn rebase_grows_redeemable_and_payout() {
        let mut h = harness("rebase", 1_000);
        let a = acct("alice");
        h.engine
            .issue_grant(&h.owner, &a, StaticAmount::new(1_000), 1_000, T0)
            .unwrap();
        h.assets.receipt.rebase(Index::new(SCALE * 2)).unwrap();

        assert_eq!(h.engine.redeemable(&a, T0 + 1_000).unwrap().get(), 2_000);
        h.engine.claim(&a, &a, StaticAmount::new(2_000), T0 + 1_000).unwrap();
        assert_eq!(h.assets.receipt.balance_of(&a), 2_000);
        assert!(h.engine.term_of(&a).unwrap().unwrap().is_exhausted());
    }

    #[test]
    fn redeemable_is_monotone_in_time() {
        let mut h = harness("monotone", 1_000_000);
        let a = acct("alice");
        h.engine
            .issue_grant(&h.owner, &a, StaticAmount::new(777_777), 3_333, T0)
            .unwrap();
        let mut last = StaticAmount::ZERO;
        for dt in (0..4_000).step_by(97) {
            let r = h.engine.redeemable(&a, T0 + dt).unwrap();
            assert!(r >= last);
            last = r;
        }
    }

    #[test]
    fn claim_reduces_redeemable_by_claimed_amount() {
        let mut h = harness("reduce", 1_000_000);
        let a = acct("alice");
        h.engine
            .issue_grant(&h.owner, &a, StaticAmount::new(1_000_000), 1_000, T0)
            .unwrap();
        h.assets.receipt.rebase(Index::new(SCALE * 3 / 2)).unwrap();

        let now = T0 + 400;
        let before = h.engine.redeemable(&a, now).unwrap();
        h.engine.claim(&a, &a, StaticAmount::new(1_001), now).unwrap();
        let after = h.engine.redeemable(&a, now).unwrap();
        let drop = before.get() - after.get();
        assert!((1_000..=1_002).contains(&drop), "dropped {drop}");
    }

    #[test]
    fn non_authority_cannot_grant() {
        let mut h = harness("unauthorized", 1_000);
        let mallory = acct("mallory");
        let err = h
            .engine
            .issue_grant(&mallory, &mallory, StaticAmount::new(1), 10, T0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(h.engine.term_of(&mallory).unwrap().is_none());
    }

    #[test]
    fn duplicate_grant_rejected_without_pulling_funds() {
        let mut h = harness("duplicate", 1_000);
        let a = acct("alice");
        h.engine
            .issue_grant(&h.owner, &a, StaticAmount::new(100), 10, T0)
            .unwrap();
        let err = h
            .engine
            .issue_grant(&h.owner, &a, StaticAmount::new(100), 10, T0)
            .unwrap_err();
        assert!(matches!(err, VestingError::DuplicateGrant(_)));
        assert_eq!(h.assets.base.balance_of(&h.owner), 900);
    }

    #[test]
    fn unfunded_grant_leaves_no_term() {
        let mut h = harness("unfunded", 10);
        let a = acct("alice");
        let err = h
            .engine
            .issue_grant(&h.owner, &a, StaticAmount::new(100), 10, T0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Collaborator);
        assert!(h.engine.term_of(&a).unwrap().is_none());
    }

    struct OfflineStaking;

    impl YieldTransform for OfflineStaking {
        fn stake(&self, _from: &AccountId, _recipient: &AccountId, _amount: StaticAmount) -> Result<(), VestingError> {
            Err(VestingError::InvalidConfig("staking offline".into()))
        }
    }

    /// Receipt that reports balances but refuses to move them.
    struct FrozenReceipt(Arc<RebasingToken>);

    impl FungibleAsset for FrozenReceipt {
        fn balance_of(&self, who: &AccountId) -> Balance {
            self.0.balance_of(who)
        }

        fn total_supply(&self) -> Balance {
            self.0.total_supply()
        }

        fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Balance {
            self.0.allowance(owner, spender)
        }

        fn transfer(&self, _from: &AccountId, _to: &AccountId, _amount: Balance) -> Result<(), VestingError> {
            Err(VestingError::InvalidConfig("receipt frozen".into()))
        }

        fn transfer_from(
            &self,
            _spender: &AccountId,
            _from: &AccountId,
            _to: &AccountId,
            _amount: Balance,
        ) -> Result<(), VestingError> {
            Err(VestingError::InvalidConfig("receipt frozen".into()))
        }
    }

    fn rewire(h: &Harness, assets: FixedAssets) -> FixedVestingEngine {
        FixedVestingEngine::new(h.engine.db().clone(), h.engine.config().clone(), assets).unwrap()
    }

    #[test]
    fn failed_stake_returns_funding_and_leaves_no_term() {
        let h = harness("failed_stake", 1_000);
        let mut engine = rewire(
            &h,
            FixedAssets {
                staking: Arc::new(OfflineStaking),
                ..h.assets.fixed_assets()
            },
        );
        let a = acct("alice");
        let err = engine
            .issue_grant(&h.owner, &a, StaticAmount::new(600), 100, T0)
            .unwrap_err();
        assert!(matches!(err, VestingError::InvalidConfig(_)));
        assert_eq!(h.assets.base.balance_of(&h.owner), 1_000);
        assert_eq!(h.assets.base.balance_of(&h.custody), 0);
        assert_eq!(h.assets.receipt.balance_of(&h.custody), 0);
        assert!(engine.term_of(&a).unwrap().is_none());
    }

    #[test]
    fn short_allowance_rejected_before_any_transfer() {
        let mut h = harness("short_allowance", 1_000);
        h.assets.base.approve(&h.owner, &h.custody, 100);
        let a = acct("alice");
        let err = h
            .engine
            .issue_grant(&h.owner, &a, StaticAmount::new(600), 100, T0)
            .unwrap_err();
        assert!(matches!(err, VestingError::InsufficientAllowance { need: 600, have: 100 }));
        assert_eq!(h.assets.base.balance_of(&h.owner), 1_000);
        assert!(h.engine.term_of(&a).unwrap().is_none());
    }

    #[test]
    fn failed_payout_restores_the_term() {
        let mut h = harness("failed_payout", 1_000);
        let a = acct("alice");
        h.engine
            .issue_grant(&h.owner, &a, StaticAmount::new(1_000), 1_000, T0)
            .unwrap();
        let granted = h.engine.term_of(&a).unwrap().unwrap();

        let mut engine = rewire(
            &h,
            FixedAssets {
                receipt: Arc::new(FrozenReceipt(h.assets.receipt.clone())),
                ..h.assets.fixed_assets()
            },
        );
        let err = engine.claim(&a, &a, StaticAmount::new(500), T0 + 500).unwrap_err();
        assert!(matches!(err, VestingError::InvalidConfig(_)));
        assert_eq!(engine.term_of(&a).unwrap().unwrap(), granted);
        assert_eq!(h.assets.receipt.balance_of(&h.custody), 1_000);
        assert_eq!(engine.redeemable(&a, T0 + 500).unwrap().get(), 500);
    }

    #[test]
    fn custody_shortfall_rejected_before_recording() {
        let mut h = harness("custody_short", 1_000);
        let a = acct("alice");
        h.engine
            .issue_grant(&h.owner, &a, StaticAmount::new(1_000), 1_000, T0)
            .unwrap();
        h.assets.receipt.transfer(&h.custody, &acct("elsewhere"), 900).unwrap();

        let err = h.engine.claim(&a, &a, StaticAmount::new(500), T0 + 500).unwrap_err();
        assert!(matches!(err, VestingError::InsufficientBalance { need: 500, have: 100 }));
        assert!(h.engine.term_of(&a).unwrap().unwrap().index_adjusted_claimed.is_zero());
    }

    #[test]
    fn zero_amount_and_zero_length_rejected() {
        let mut h = harness("zeros", 10);
        let a = acct("alice");
        assert!(matches!(
            h.engine.issue_grant(&h.owner, &a, StaticAmount::ZERO, 10, T0),
            Err(VestingError::ZeroAmount)
        ));
        assert!(matches!(
            h.engine.issue_grant(&h.owner, &a, StaticAmount::new(5), 0, T0),
            Err(VestingError::InvalidVestingLength)
        ));
        assert!(matches!(
            h.engine.claim(&a, &a, StaticAmount::ZERO, T0),
            Err(VestingError::ZeroAmount)
        ));
    }

    #[test]
    fn sub_index_claim_rejected() {
        let mut h = harness("dust", 1_000);
        let a = acct("alice");
        h.engine
            .issue_grant(&h.owner, &a, StaticAmount::new(1_000), 10, T0)
            .unwrap();
        h.assets.receipt.rebase(Index::new(SCALE * 4)).unwrap();
        assert!(matches!(
            h.engine.claim(&a, &a, StaticAmount::new(3), T0 + 10),
            Err(VestingError::ZeroAmount)
        ));
        h.engine.claim(&a, &a, StaticAmount::new(4), T0 + 10).unwrap();
        assert_eq!(h.engine.term_of(&a).unwrap().unwrap().index_adjusted_claimed.get(), 1);
    }

    #[test]
    fn claim_without_term_is_insufficient() {
        let mut h = harness("no_term", 10);
        let a = acct("nobody");
        assert!(matches!(
            h.engine.claim(&a, &a, StaticAmount::new(1), T0),
            Err(VestingError::InsufficientVested { redeemable: 0, .. })
        ));
    }

    #[test]
    fn migrated_term_keeps_vesting() {
        let mut h = harness("migrate", 1_000);
        let (a, b) = (acct("alice"), acct("bob"));
        h.engine
            .issue_grant(&h.owner, &a, StaticAmount::new(1_000), 1_000, T0)
            .unwrap();
        h.engine.claim(&a, &a, StaticAmount::new(100), T0 + 200).unwrap();
        let before = h.engine.term_of(&a).unwrap().unwrap();

        h.engine.push_wallet_change(&a, &b).unwrap();
        assert_eq!(h.engine.pending_wallet_change(&a).unwrap(), Some(b.clone()));
        let moved = h.engine.pull_wallet_change(&b, &a).unwrap();
        assert_eq!(moved, before);

        assert_eq!(h.engine.redeemable(&a, T0 + 1_000).unwrap(), StaticAmount::ZERO);
        assert_eq!(h.engine.redeemable(&b, T0 + 1_000).unwrap().get(), 900);
    }

    #[test]
    fn engine_refuses_supply_database() {
        let db = Arc::new(temp_db("fixed_wrong_kind"));
        db.bind_kind(indexvest_core::constants::LEDGER_KIND_SUPPLY).unwrap();
        let assets = MemoryAssets::new();
        let config = FixedLedgerConfig {
            authority: acct("owner"),
            custody: acct("custody"),
        };
        assert!(matches!(
            FixedVestingEngine::new(db, config, assets.fixed_assets()),
            Err(VestingError::LedgerKindMismatch { .. })
        ));
    }
}
