//! In-memory collaborators.
//!
//! Used by the tests and by the CLI, which persists them between runs as a
//! JSON `AssetBook`. `RebasingToken` keeps balances in index-adjusted
//! shares, so a rebase grows every holder's balance without touching the
//! share map.

use std::collections::BTreeMap;
use std::sync::Arc;

use indexvest_core::constants::SCALE;
use indexvest_core::error::VestingError;
use indexvest_core::index::{from_index_adjusted, to_index_adjusted};
use indexvest_core::types::{AccountId, Balance, Index, IndexAdjusted, StaticAmount};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::assets::{
    FixedAssets, FungibleAsset, IndexSource, MintTransform, SupplyAssets, YieldTransform,
};

type Allowances = BTreeMap<AccountId, BTreeMap<AccountId, Balance>>;

fn allowance_of(allowances: &Allowances, owner: &AccountId, spender: &AccountId) -> Balance {
    allowances
        .get(owner)
        .and_then(|m| m.get(spender))
        .copied()
        .unwrap_or(0)
}

fn spend_allowance(
    allowances: &mut Allowances,
    owner: &AccountId,
    spender: &AccountId,
    amount: Balance,
) -> Result<(), VestingError> {
    let have = allowance_of(allowances, owner, spender);
    if have < amount {
        return Err(VestingError::InsufficientAllowance { need: amount, have });
    }
    allowances
        .entry(owner.clone())
        .or_default()
        .insert(spender.clone(), have - amount);
    Ok(())
}

// ── MemoryToken ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBook {
    pub balances: BTreeMap<AccountId, Balance>,
    /// owner → spender → remaining allowance
    #[serde(default)]
    pub allowances: Allowances,
    pub total_supply: Balance,
}

impl TokenBook {
    fn move_balance(&mut self, from: &AccountId, to: &AccountId, amount: Balance) -> Result<(), VestingError> {
        let have = self.balances.get(from).copied().unwrap_or(0);
        if have < amount {
            return Err(VestingError::InsufficientBalance { need: amount, have });
        }
        self.balances.insert(from.clone(), have - amount);
        let to_balance = self.balances.entry(to.clone()).or_insert(0);
        *to_balance = to_balance
            .checked_add(amount)
            .ok_or(VestingError::ArithmeticOverflow)?;
        Ok(())
    }
}

/// Plain fungible token with mint and allowances.
#[derive(Debug, Default)]
pub struct MemoryToken {
    book: RwLock<TokenBook>,
}

impl MemoryToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_book(book: TokenBook) -> Self {
        Self { book: RwLock::new(book) }
    }

    pub fn snapshot(&self) -> TokenBook {
        self.book.read().clone()
    }

    pub fn mint(&self, to: &AccountId, amount: Balance) -> Result<(), VestingError> {
        let mut book = self.book.write();
        let supply = book
            .total_supply
            .checked_add(amount)
            .ok_or(VestingError::ArithmeticOverflow)?;
        let balance = book.balances.entry(to.clone()).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(VestingError::ArithmeticOverflow)?;
        book.total_supply = supply;
        Ok(())
    }

    pub fn approve(&self, owner: &AccountId, spender: &AccountId, amount: Balance) {
        self.book
            .write()
            .allowances
            .entry(owner.clone())
            .or_default()
            .insert(spender.clone(), amount);
    }

}

impl FungibleAsset for MemoryToken {
    fn balance_of(&self, who: &AccountId) -> Balance {
        self.book.read().balances.get(who).copied().unwrap_or(0)
    }

    fn total_supply(&self) -> Balance {
        self.book.read().total_supply
    }

    fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Balance {
        allowance_of(&self.book.read().allowances, owner, spender)
    }

    fn transfer(&self, from: &AccountId, to: &AccountId, amount: Balance) -> Result<(), VestingError> {
        self.book.write().move_balance(from, to, amount)
    }

    fn transfer_from(
        &self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Balance,
    ) -> Result<(), VestingError> {
        let mut book = self.book.write();
        // Check the balance before spending allowance so a failed move
        // leaves the allowance untouched.
        let have = book.balances.get(from).copied().unwrap_or(0);
        if have < amount {
            return Err(VestingError::InsufficientBalance { need: amount, have });
        }
        spend_allowance(&mut book.allowances, from, spender, amount)?;
        book.move_balance(from, to, amount)
    }
}

// ── RebasingToken ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebasingBook {
    pub shares: BTreeMap<AccountId, IndexAdjusted>,
    pub total_shares: IndexAdjusted,
    pub index: Index,
    #[serde(default)]
    pub allowances: Allowances,
}

impl Default for RebasingBook {
    fn default() -> Self {
        Self {
            shares: BTreeMap::new(),
            total_shares: IndexAdjusted::ZERO,
            index: Index::new(SCALE),
            allowances: Allowances::new(),
        }
    }
}

impl RebasingBook {
    fn balance(&self, who: &AccountId) -> Result<Balance, VestingError> {
        let shares = self.shares.get(who).copied().unwrap_or_default();
        Ok(from_index_adjusted(shares, self.index)?.get())
    }

    fn supply(&self) -> Result<Balance, VestingError> {
        Ok(from_index_adjusted(self.total_shares, self.index)?.get())
    }

    fn move_shares(&mut self, from: &AccountId, to: &AccountId, amount: Balance) -> Result<(), VestingError> {
        let shares = to_index_adjusted(StaticAmount::new(amount), self.index)?;
        let have = self.shares.get(from).copied().unwrap_or_default();
        if have < shares {
            return Err(VestingError::InsufficientBalance { need: amount, have: self.balance(from)? });
        }
        self.shares.insert(from.clone(), have.saturating_sub(shares));
        let to_shares = self.shares.entry(to.clone()).or_default();
        *to_shares = to_shares.checked_add(shares)?;
        Ok(())
    }
}

/// Yield-bearing receipt whose balances grow with the index.
#[derive(Debug, Default)]
pub struct RebasingToken {
    book: RwLock<RebasingBook>,
}

impl RebasingToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_book(book: RebasingBook) -> Self {
        Self { book: RwLock::new(book) }
    }

    pub fn snapshot(&self) -> RebasingBook {
        self.book.read().clone()
    }

    /// Move the index forward. A lower index is rejected, as is one under
    /// which the total supply no longer fits a `Balance`.
    pub fn rebase(&self, new_index: Index) -> Result<(), VestingError> {
        let mut book = self.book.write();
        if new_index < book.index {
            return Err(VestingError::IndexDecrease {
                current: book.index.get(),
                proposed: new_index.get(),
            });
        }
        from_index_adjusted(book.total_shares, new_index)?;
        book.index = new_index;
        Ok(())
    }

    pub fn shares_of(&self, who: &AccountId) -> IndexAdjusted {
        self.book.read().shares.get(who).copied().unwrap_or_default()
    }

    pub fn approve(&self, owner: &AccountId, spender: &AccountId, amount: Balance) {
        self.book
            .write()
            .allowances
            .entry(owner.clone())
            .or_default()
            .insert(spender.clone(), amount);
    }

    fn credit_shares(&self, to: &AccountId, shares: IndexAdjusted) -> Result<(), VestingError> {
        let mut book = self.book.write();
        let total = book.total_shares.checked_add(shares)?;
        from_index_adjusted(total, book.index)?;
        let entry = book.shares.entry(to.clone()).or_default();
        *entry = entry.checked_add(shares)?;
        book.total_shares = total;
        Ok(())
    }
}

impl IndexSource for RebasingToken {
    fn index(&self) -> Index {
        self.book.read().index
    }
}

impl FungibleAsset for RebasingToken {
    // `rebase` and `credit_shares` keep the total supply representable. A
    // restored book that breaks this reads as saturated.
    fn balance_of(&self, who: &AccountId) -> Balance {
        self.book.read().balance(who).unwrap_or(Balance::MAX)
    }

    fn total_supply(&self) -> Balance {
        self.book.read().supply().unwrap_or(Balance::MAX)
    }

    fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Balance {
        allowance_of(&self.book.read().allowances, owner, spender)
    }

    fn transfer(&self, from: &AccountId, to: &AccountId, amount: Balance) -> Result<(), VestingError> {
        self.book.write().move_shares(from, to, amount)
    }

    fn transfer_from(
        &self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Balance,
    ) -> Result<(), VestingError> {
        let mut book = self.book.write();
        let have = book.balance(from)?;
        if have < amount {
            return Err(VestingError::InsufficientBalance { need: amount, have });
        }
        spend_allowance(&mut book.allowances, from, spender, amount)?;
        book.move_shares(from, to, amount)
    }
}

// ── MemoryStaking ─────────────────────────────────────────────────────────────

/// Locks the static asset in a vault and credits the rebasing receipt.
pub struct MemoryStaking {
    base: Arc<MemoryToken>,
    receipt: Arc<RebasingToken>,
    vault: AccountId,
}

impl MemoryStaking {
    pub fn new(base: Arc<MemoryToken>, receipt: Arc<RebasingToken>, vault: AccountId) -> Self {
        Self { base, receipt, vault }
    }

    pub fn vault(&self) -> &AccountId {
        &self.vault
    }
}

impl YieldTransform for MemoryStaking {
    fn stake(&self, from: &AccountId, recipient: &AccountId, amount: StaticAmount) -> Result<(), VestingError> {
        let shares = to_index_adjusted(amount, self.receipt.index())?;
        self.base.transfer(from, &self.vault, amount.get())?;
        if let Err(e) = self.receipt.credit_shares(recipient, shares) {
            self.base.transfer(&self.vault, from, amount.get())?;
            return Err(e);
        }
        Ok(())
    }
}

// ── MemoryTreasury ────────────────────────────────────────────────────────────

/// Mints the claim asset at a fixed reserve backing ratio.
pub struct MemoryTreasury {
    claim: Arc<MemoryToken>,
    backing_ratio: u128,
}

impl MemoryTreasury {
    pub fn new(claim: Arc<MemoryToken>, backing_ratio: u128) -> Self {
        Self { claim, backing_ratio }
    }
}

impl MintTransform for MemoryTreasury {
    fn reserve_backing_ratio(&self) -> u128 {
        self.backing_ratio
    }

    fn mint(&self, recipient: &AccountId, amount: StaticAmount) -> Result<(), VestingError> {
        self.claim.mint(recipient, amount.get())
    }
}

// ── AssetBook / MemoryAssets ──────────────────────────────────────────────────

/// Serializable snapshot of every in-memory collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBook {
    /// Static claim asset: staked by fixed grants, minted by the treasury.
    pub base: TokenBook,
    pub receipt: RebasingBook,
    pub payment: TokenBook,
    pub vault: AccountId,
    pub backing_ratio: u128,
}

impl Default for AssetBook {
    fn default() -> Self {
        Self {
            base: TokenBook::default(),
            receipt: RebasingBook::default(),
            payment: TokenBook::default(),
            vault: AccountId::from_label("indexvest:staking-vault"),
            backing_ratio: SCALE,
        }
    }
}

/// Live handles over one `AssetBook`.
pub struct MemoryAssets {
    pub base: Arc<MemoryToken>,
    pub receipt: Arc<RebasingToken>,
    pub payment: Arc<MemoryToken>,
    pub staking: Arc<MemoryStaking>,
    pub treasury: Arc<MemoryTreasury>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::from_book(AssetBook::default())
    }

    pub fn from_book(book: AssetBook) -> Self {
        let base = Arc::new(MemoryToken::from_book(book.base));
        let receipt = Arc::new(RebasingToken::from_book(book.receipt));
        let payment = Arc::new(MemoryToken::from_book(book.payment));
        let staking = Arc::new(MemoryStaking::new(
            Arc::clone(&base),
            Arc::clone(&receipt),
            book.vault,
        ));
        let treasury = Arc::new(MemoryTreasury::new(Arc::clone(&base), book.backing_ratio));
        Self { base, receipt, payment, staking, treasury }
    }

    pub fn book(&self) -> AssetBook {
        AssetBook {
            base: self.base.snapshot(),
            receipt: self.receipt.snapshot(),
            payment: self.payment.snapshot(),
            vault: self.staking.vault().clone(),
            backing_ratio: self.treasury.reserve_backing_ratio(),
        }
    }

    pub fn fixed_assets(&self) -> FixedAssets {
        FixedAssets {
            base: self.base.clone(),
            receipt: self.receipt.clone(),
            staking: self.staking.clone(),
            index: self.receipt.clone(),
        }
    }

    pub fn supply_assets(&self) -> SupplyAssets {
        SupplyAssets {
            claim: self.base.clone(),
            payment: self.payment.clone(),
            treasury: self.treasury.clone(),
            index: self.receipt.clone(),
        }
    }
}

impl Default for MemoryAssets {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(label: &str) -> AccountId {
        AccountId::from_label(label)
    }

    #[test]
    fn mint_and_transfer() {
        let token = MemoryToken::new();
        token.mint(&acct("a"), 100).unwrap();
        token.transfer(&acct("a"), &acct("b"), 40).unwrap();
        assert_eq!(token.balance_of(&acct("a")), 60);
        assert_eq!(token.balance_of(&acct("b")), 40);
        assert_eq!(token.total_supply(), 100);
    }

    #[test]
    fn transfer_from_needs_allowance() {
        let token = MemoryToken::new();
        token.mint(&acct("a"), 100).unwrap();
        let err = token
            .transfer_from(&acct("s"), &acct("a"), &acct("b"), 10)
            .unwrap_err();
        assert!(matches!(err, VestingError::InsufficientAllowance { need: 10, have: 0 }));

        token.approve(&acct("a"), &acct("s"), 25);
        token.transfer_from(&acct("s"), &acct("a"), &acct("b"), 10).unwrap();
        assert_eq!(token.allowance(&acct("a"), &acct("s")), 15);
        assert_eq!(token.balance_of(&acct("b")), 10);
    }

    #[test]
    fn failed_transfer_from_keeps_allowance() {
        let token = MemoryToken::new();
        token.mint(&acct("a"), 5).unwrap();
        token.approve(&acct("a"), &acct("s"), 25);
        assert!(token.transfer_from(&acct("s"), &acct("a"), &acct("b"), 10).is_err());
        assert_eq!(token.allowance(&acct("a"), &acct("s")), 25);
    }

    #[test]
    fn staking_credits_receipt_and_rebase_grows_it() {
        let assets = MemoryAssets::new();
        assets.base.mint(&acct("a"), 1_000).unwrap();
        assets.staking.stake(&acct("a"), &acct("a"), StaticAmount::new(1_000)).unwrap();
        assert_eq!(assets.base.balance_of(&acct("a")), 0);
        assert_eq!(assets.receipt.balance_of(&acct("a")), 1_000);

        assets.receipt.rebase(Index::new(SCALE * 11 / 10)).unwrap();
        assert_eq!(assets.receipt.balance_of(&acct("a")), 1_100);
        assert_eq!(assets.receipt.total_supply(), 1_100);
    }

    #[test]
    fn rebase_cannot_go_backwards() {
        let receipt = RebasingToken::new();
        receipt.rebase(Index::new(SCALE * 2)).unwrap();
        assert!(matches!(
            receipt.rebase(Index::new(SCALE)),
            Err(VestingError::IndexDecrease { .. })
        ));
    }

    #[test]
    fn rebase_refuses_unrepresentable_supply() {
        let assets = MemoryAssets::new();
        assets.base.mint(&acct("a"), Balance::MAX / 2).unwrap();
        assets
            .staking
            .stake(&acct("a"), &acct("a"), StaticAmount::new(Balance::MAX / 2))
            .unwrap();
        assert!(matches!(
            assets.receipt.rebase(Index::new(SCALE * 4)),
            Err(VestingError::ArithmeticOverflow)
        ));
        assert_eq!(assets.receipt.index(), Index::new(SCALE));
        assert_eq!(assets.receipt.balance_of(&acct("a")), Balance::MAX / 2);
    }

    #[test]
    fn overflowing_book_fails_transfers_instead_of_passing_balance_checks() {
        let mut book = RebasingBook {
            index: Index::new(SCALE * 4),
            ..RebasingBook::default()
        };
        let shares = IndexAdjusted::new(Balance::MAX / 2);
        book.shares.insert(acct("a"), shares);
        book.total_shares = shares;
        book.allowances
            .entry(acct("a"))
            .or_default()
            .insert(acct("s"), Balance::MAX);
        let receipt = RebasingToken::from_book(book);

        assert!(matches!(
            receipt.transfer_from(&acct("s"), &acct("a"), &acct("b"), Balance::MAX),
            Err(VestingError::ArithmeticOverflow)
        ));
        assert_eq!(receipt.shares_of(&acct("a")), shares);
        assert_eq!(receipt.allowance(&acct("a"), &acct("s")), Balance::MAX);
        assert_eq!(receipt.balance_of(&acct("a")), Balance::MAX);
    }

    #[test]
    fn book_json_roundtrip() {
        let assets = MemoryAssets::new();
        assets.base.mint(&acct("a"), 7).unwrap();
        assets.payment.approve(&acct("a"), &acct("b"), 3);
        let json = serde_json::to_string(&assets.book()).unwrap();
        let back: AssetBook = serde_json::from_str(&json).unwrap();
        assert_eq!(back, assets.book());
        assert_eq!(MemoryAssets::from_book(back).base.balance_of(&acct("a")), 7);
    }
}
