//! Two-phase beneficiary migration.
//!
//! The holder of a term proposes a new wallet with `push_wallet_change`;
//! the proposed wallet accepts with `pull_wallet_change`, which moves the
//! whole term and deletes the source in one commit. A proposal is only ever
//! replaced by another push from the same holder. There is no cancel.

use indexvest_core::error::VestingError;
use indexvest_core::term::TermRecord;
use indexvest_core::types::AccountId;
use tracing::info;

use crate::db::{StagedMutations, StateDb};

/// Record `new_wallet` as the pending destination for `caller`'s term.
pub fn push_wallet_change<T: TermRecord>(
    db: &StateDb,
    caller: &AccountId,
    new_wallet: &AccountId,
) -> Result<(), VestingError> {
    if !db.has_term::<T>(caller)? {
        return Err(VestingError::NoTermToMigrate(caller.to_string()));
    }

    let mut staged = StagedMutations::<T>::default();
    staged.wallet_changes.push((caller.clone(), new_wallet.clone()));
    db.commit(&staged)?;

    info!(old = %caller, new = %new_wallet, kind = T::KIND, "wallet change proposed");
    Ok(())
}

/// Accept the wallet change `old` proposed to `caller`. Returns the term as
/// it now sits at `caller`.
pub fn pull_wallet_change<T: TermRecord>(
    db: &StateDb,
    caller: &AccountId,
    old: &AccountId,
) -> Result<T, VestingError> {
    let proposed = db
        .get_wallet_change(old)?
        .ok_or_else(|| VestingError::NoPendingMigration(old.to_string()))?;
    if proposed != *caller {
        return Err(VestingError::WalletChangeMismatch {
            expected: proposed.to_string(),
            got: caller.to_string(),
        });
    }
    if db.has_term::<T>(caller)? {
        return Err(VestingError::DestinationHasTerm(caller.to_string()));
    }
    let term = db
        .get_term::<T>(old)?
        .ok_or_else(|| VestingError::NoTermToMigrate(old.to_string()))?;

    let mut staged = StagedMutations::<T>::default();
    staged.cleared_wallet_changes.push(old.clone());
    staged.removed_terms.push(old.clone());
    staged.terms.push((caller.clone(), term.clone()));
    db.commit(&staged)?;

    info!(old = %old, new = %caller, kind = T::KIND, "wallet change pulled");
    Ok(term)
}
