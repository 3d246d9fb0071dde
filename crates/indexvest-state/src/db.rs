use indexvest_core::constants::META_LEDGER_KIND;
use indexvest_core::error::VestingError;
use indexvest_core::term::TermRecord;
use indexvest_core::types::AccountId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::TransactionError;
use sled::Transactional;
use std::path::Path;

// ── Staged mutations ──────────────────────────────────────────────────────────

/// All state changes staged by an engine operation before atomic commit.
pub struct StagedMutations<T> {
    pub terms: Vec<(AccountId, T)>,
    pub removed_terms: Vec<AccountId>,
    /// old address → proposed new address
    pub wallet_changes: Vec<(AccountId, AccountId)>,
    pub cleared_wallet_changes: Vec<AccountId>,
    pub meta: Vec<(&'static str, Vec<u8>)>,
}

impl<T> Default for StagedMutations<T> {
    fn default() -> Self {
        Self {
            terms: Vec::new(),
            removed_terms: Vec::new(),
            wallet_changes: Vec::new(),
            cleared_wallet_changes: Vec::new(),
            meta: Vec::new(),
        }
    }
}

impl<T> StagedMutations<T> {
    pub fn put_meta<V: Serialize>(&mut self, key: &'static str, value: &V) -> Result<(), VestingError> {
        self.meta.push((key, encode(value)?));
        Ok(())
    }
}

// ── StateDb ───────────────────────────────────────────────────────────────────

/// Persistent ledger database backed by sled.
///
/// Named trees:
///   terms:          AccountId bytes → bincode(Term)
///   wallet_changes: AccountId bytes → AccountId bytes (pending new wallet)
///   meta:           utf8 key bytes  → bincode value
pub struct StateDb {
    _db: sled::Db,
    terms: sled::Tree,
    wallet_changes: sled::Tree,
    meta: sled::Tree,
}

impl StateDb {
    /// Open or create the ledger database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, VestingError> {
        let db = sled::open(path).map_err(storage)?;
        let terms          = db.open_tree("terms").map_err(storage)?;
        let wallet_changes = db.open_tree("wallet_changes").map_err(storage)?;
        let meta           = db.open_tree("meta").map_err(storage)?;
        Ok(Self { _db: db, terms, wallet_changes, meta })
    }

    /// Tie this database to one schedule variant. The first call records
    /// `kind`; later calls fail if a different kind was recorded.
    pub fn bind_kind(&self, kind: &str) -> Result<(), VestingError> {
        match self.get_meta::<String>(META_LEDGER_KIND)? {
            Some(found) if found != kind => Err(VestingError::LedgerKindMismatch {
                expected: kind.to_string(),
                found,
            }),
            Some(_) => Ok(()),
            None => self.put_meta(META_LEDGER_KIND, &kind.to_string()),
        }
    }

    // ── Terms ─────────────────────────────────────────────────────────────────

    /// The term held by `id`. A stored record without entitlement reads as
    /// no term.
    pub fn get_term<T: TermRecord>(&self, id: &AccountId) -> Result<Option<T>, VestingError> {
        match self.terms.get(id.as_bytes()).map_err(storage)? {
            Some(bytes) => {
                let term: T = decode(&bytes)?;
                Ok(term.has_entitlement().then_some(term))
            }
            None => Ok(None),
        }
    }

    pub fn has_term<T: TermRecord>(&self, id: &AccountId) -> Result<bool, VestingError> {
        Ok(self.get_term::<T>(id)?.is_some())
    }

    /// Every term with entitlement, ordered by account bytes.
    pub fn iter_terms<T: TermRecord>(&self) -> Result<Vec<(AccountId, T)>, VestingError> {
        let mut out = Vec::new();
        for item in self.terms.iter() {
            let (key, bytes) = item.map_err(storage)?;
            let term: T = decode(&bytes)?;
            if term.has_entitlement() {
                out.push((account_from_slice(&key)?, term));
            }
        }
        Ok(out)
    }

    // ── Wallet changes ────────────────────────────────────────────────────────

    pub fn get_wallet_change(&self, old: &AccountId) -> Result<Option<AccountId>, VestingError> {
        match self.wallet_changes.get(old.as_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(account_from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    // ── Meta ──────────────────────────────────────────────────────────────────

    pub fn get_meta<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>, VestingError> {
        match self.meta.get(key.as_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_meta<V: Serialize>(&self, key: &str, value: &V) -> Result<(), VestingError> {
        self.meta
            .insert(key.as_bytes(), encode(value)?)
            .map_err(storage)?;
        Ok(())
    }

    // ── Commit ────────────────────────────────────────────────────────────────

    /// Apply every staged mutation in one multi-tree transaction. Either all
    /// writes land or none do.
    pub fn commit<T: TermRecord>(&self, staged: &StagedMutations<T>) -> Result<(), VestingError> {
        let terms = staged
            .terms
            .iter()
            .map(|(id, term)| Ok((id, encode(term)?)))
            .collect::<Result<Vec<_>, VestingError>>()?;

        (&self.terms, &self.wallet_changes, &self.meta)
            .transaction(|(terms_tx, changes_tx, meta_tx)| {
                for id in &staged.removed_terms {
                    terms_tx.remove(&id.as_bytes()[..])?;
                }
                for (id, bytes) in &terms {
                    terms_tx.insert(&id.as_bytes()[..], bytes.as_slice())?;
                }
                for old in &staged.cleared_wallet_changes {
                    changes_tx.remove(&old.as_bytes()[..])?;
                }
                for (old, new) in &staged.wallet_changes {
                    changes_tx.insert(&old.as_bytes()[..], &new.as_bytes()[..])?;
                }
                for (key, bytes) in &staged.meta {
                    meta_tx.insert(key.as_bytes(), bytes.as_slice())?;
                }
                Ok(())
            })
            .map_err(|e: TransactionError<()>| match e {
                TransactionError::Abort(()) => VestingError::Storage("commit aborted".into()),
                TransactionError::Storage(e) => storage(e),
            })
    }

    /// Put back `previous` for `id`, or drop the term when there was none.
    pub fn restore_term<T: TermRecord>(&self, id: &AccountId, previous: Option<&T>) -> Result<(), VestingError> {
        let mut staged = StagedMutations::<T>::default();
        match previous {
            Some(term) => staged.terms.push((id.clone(), term.clone())),
            None => staged.removed_terms.push(id.clone()),
        }
        self.commit(&staged)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), VestingError> {
        self._db.flush().map_err(storage)?;
        Ok(())
    }
}

// ── Encoding helpers ──────────────────────────────────────────────────────────

fn storage(e: sled::Error) -> VestingError {
    VestingError::Storage(e.to_string())
}

fn encode<V: Serialize + ?Sized>(value: &V) -> Result<Vec<u8>, VestingError> {
    bincode::serialize(value).map_err(|e| VestingError::Serialization(e.to_string()))
}

fn decode<V: DeserializeOwned>(bytes: &[u8]) -> Result<V, VestingError> {
    bincode::deserialize(bytes).map_err(|e| VestingError::Serialization(e.to_string()))
}

fn account_from_slice(bytes: &[u8]) -> Result<AccountId, VestingError> {
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| VestingError::Serialization(format!("bad account key length {}", bytes.len())))?;
    Ok(AccountId::from_bytes(arr))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use indexvest_core::constants::{LEDGER_KIND_FIXED, LEDGER_KIND_SUPPLY, META_TOTAL_ALLOCATED};
    use indexvest_core::types::{IndexAdjusted, Percent};
    use indexvest_core::{SupplyTerm, VestingWindow, FixedTerm};

    pub(crate) fn temp_db(name: &str) -> StateDb {
        let dir = std::env::temp_dir().join(format!("indexvest_db_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        StateDb::open(&dir).expect("open temp db")
    }

    /// Open `dir` again, waiting for a dropped handle's background flusher
    /// to release the file lock.
    pub(crate) fn reopen(dir: &Path) -> StateDb {
        for _ in 0..100 {
            match StateDb::open(dir) {
                Ok(db) => return db,
                Err(_) => std::thread::sleep(std::time::Duration::from_millis(50)),
            }
        }
        StateDb::open(dir).expect("reopen db")
    }

    fn acct(label: &str) -> AccountId {
        AccountId::from_label(label)
    }

    #[test]
    fn commit_writes_all_trees() {
        let db = temp_db("commit_all");
        let mut staged = StagedMutations::<SupplyTerm>::default();
        staged.terms.push((acct("a"), SupplyTerm::new(Percent::new(5))));
        staged.wallet_changes.push((acct("a"), acct("b")));
        staged.put_meta(META_TOTAL_ALLOCATED, &Percent::new(5)).unwrap();
        db.commit(&staged).unwrap();

        assert_eq!(
            db.get_term::<SupplyTerm>(&acct("a")).unwrap(),
            Some(SupplyTerm::new(Percent::new(5)))
        );
        assert_eq!(db.get_wallet_change(&acct("a")).unwrap(), Some(acct("b")));
        assert_eq!(
            db.get_meta::<Percent>(META_TOTAL_ALLOCATED).unwrap(),
            Some(Percent::new(5))
        );
    }

    #[test]
    fn removals_apply_in_same_commit() {
        let db = temp_db("commit_remove");
        let mut staged = StagedMutations::<SupplyTerm>::default();
        staged.terms.push((acct("a"), SupplyTerm::new(Percent::new(5))));
        staged.wallet_changes.push((acct("a"), acct("b")));
        db.commit(&staged).unwrap();

        let mut staged = StagedMutations::<SupplyTerm>::default();
        staged.removed_terms.push(acct("a"));
        staged.cleared_wallet_changes.push(acct("a"));
        staged.terms.push((acct("b"), SupplyTerm::new(Percent::new(5))));
        db.commit(&staged).unwrap();

        assert!(!db.has_term::<SupplyTerm>(&acct("a")).unwrap());
        assert!(db.has_term::<SupplyTerm>(&acct("b")).unwrap());
        assert_eq!(db.get_wallet_change(&acct("a")).unwrap(), None);
    }

    #[test]
    fn zero_entitlement_reads_as_absent() {
        let db = temp_db("zero_term");
        let mut staged = StagedMutations::<FixedTerm>::default();
        let w = VestingWindow::new(0, 10).unwrap();
        staged.terms.push((acct("z"), FixedTerm::new(IndexAdjusted::ZERO, w)));
        db.commit(&staged).unwrap();
        assert_eq!(db.get_term::<FixedTerm>(&acct("z")).unwrap(), None);
        assert!(db.iter_terms::<FixedTerm>().unwrap().is_empty());
    }

    #[test]
    fn kind_binding_is_sticky() {
        let db = temp_db("kind_binding");
        db.bind_kind(LEDGER_KIND_FIXED).unwrap();
        db.bind_kind(LEDGER_KIND_FIXED).unwrap();
        assert!(matches!(
            db.bind_kind(LEDGER_KIND_SUPPLY),
            Err(VestingError::LedgerKindMismatch { .. })
        ));
    }

    #[test]
    fn reopen_preserves_state() {
        let dir = std::env::temp_dir().join("indexvest_db_test_reopen");
        let _ = std::fs::remove_dir_all(&dir);
        {
            let db = StateDb::open(&dir).unwrap();
            let mut staged = StagedMutations::<SupplyTerm>::default();
            staged.terms.push((acct("a"), SupplyTerm::new(Percent::new(9))));
            db.commit(&staged).unwrap();
            db.flush().unwrap();
        }
        let db = reopen(&dir);
        assert_eq!(db.iter_terms::<SupplyTerm>().unwrap().len(), 1);
    }
}
