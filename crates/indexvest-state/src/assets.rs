//! Collaborator interfaces consumed by the engines.
//!
//! The index source, the staking transform, the treasury mint and the
//! fungible assets themselves live outside the ledger. Calls are
//! synchronous and take `&self`; none of them can reach back into an
//! engine, whose mutating operations hold `&mut self` for their whole run.

use std::sync::Arc;

use indexvest_core::error::VestingError;
use indexvest_core::types::{AccountId, Balance, Index, StaticAmount};

/// Current exchange rate of the yield-bearing asset. Non-decreasing.
pub trait IndexSource: Send + Sync {
    fn index(&self) -> Index;
}

/// Transfer and supply semantics shared by every asset handle. No fees:
/// the amount debited is the amount credited.
pub trait FungibleAsset: Send + Sync {
    fn balance_of(&self, who: &AccountId) -> Balance;

    fn total_supply(&self) -> Balance;

    /// Amount `spender` may still move out of `owner`'s balance.
    fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Balance;

    fn transfer(&self, from: &AccountId, to: &AccountId, amount: Balance) -> Result<(), VestingError>;

    /// Move `amount` from `from` to `to` against the allowance `from`
    /// granted to `spender`.
    fn transfer_from(
        &self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Balance,
    ) -> Result<(), VestingError>;
}

/// Converts the static asset held by `from` into the yield-bearing receipt
/// credited to `recipient`.
pub trait YieldTransform: Send + Sync {
    fn stake(&self, from: &AccountId, recipient: &AccountId, amount: StaticAmount) -> Result<(), VestingError>;
}

/// Treasury side of the percent-of-supply schedule.
pub trait MintTransform: Send + Sync {
    /// Payment units per claim unit, scaled by `SCALE`.
    fn reserve_backing_ratio(&self) -> u128;

    fn mint(&self, recipient: &AccountId, amount: StaticAmount) -> Result<(), VestingError>;
}

/// Collaborators of the fixed-grant ledger.
#[derive(Clone)]
pub struct FixedAssets {
    /// Static asset pulled from the authority on every grant.
    pub base: Arc<dyn FungibleAsset>,
    /// Yield-bearing receipt paid out on claims.
    pub receipt: Arc<dyn FungibleAsset>,
    pub staking: Arc<dyn YieldTransform>,
    pub index: Arc<dyn IndexSource>,
}

/// Collaborators of the percent-of-supply ledger.
#[derive(Clone)]
pub struct SupplyAssets {
    /// Asset whose total supply sizes every share; minted on claims.
    pub claim: Arc<dyn FungibleAsset>,
    /// Asset beneficiaries pay into the treasury when claiming.
    pub payment: Arc<dyn FungibleAsset>,
    pub treasury: Arc<dyn MintTransform>,
    pub index: Arc<dyn IndexSource>,
}
