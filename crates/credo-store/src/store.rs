//! RocksDB storage backend for the trust engine.
//!
//! All four logical tables live in one `OptimisticTransactionDB`, so a score
//! update and its ledger append commit atomically. Reads that precede a write
//! inside a transaction use `get_for_update`, which makes concurrent writers
//! to the same identifier conflict at commit time instead of interleaving.

use chrono::{DateTime, Utc};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBIteratorWithThreadMode, Direction, ErrorKind,
    IteratorMode, OptimisticTransactionDB, Options, Transaction,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use credo_core::{
    Did, LedgerEntry, PolicyRule, RecoveryCase, RecoveryStatus, ScoreRecord, TrustError,
};

use crate::keys::{ledger_entry_key, ledger_head_key, ledger_prefix};

/// Column family names for the persisted relations.
pub const CF_SCORES: &str = "identifier_scores";
pub const CF_LEDGER: &str = "identifier_ledger";
pub const CF_RULES: &str = "policy_rules";
pub const CF_RECOVERY: &str = "recovery_cases";

const COLUMN_FAMILIES: [&str; 4] = [CF_SCORES, CF_LEDGER, CF_RULES, CF_RECOVERY];

/// Map a RocksDB error, keeping lock conflicts distinguishable from
/// permanent failures.
pub fn storage_err(err: rocksdb::Error) -> TrustError {
    match err.kind() {
        ErrorKind::Busy | ErrorKind::TryAgain | ErrorKind::TimedOut => {
            TrustError::Busy(err.to_string())
        }
        _ => TrustError::Storage(err.to_string()),
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TrustError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Tail of an identifier's ledger. Every append reads it for update, so
/// appends for one identifier are serialized even when nothing else in the
/// transaction touches the same keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerHead {
    pub last_timestamp: DateTime<Utc>,
    pub entries: u64,
}

/// RocksDB-backed storage for the trust engine.
pub struct TrustStore {
    db: OptimisticTransactionDB,
    path: PathBuf,
}

impl TrustStore {
    /// Open or create the database at the given path with all column families.
    pub fn open(path: &Path) -> Result<Self, TrustError> {
        std::fs::create_dir_all(path).map_err(|e| {
            TrustError::Storage(format!("cannot create {}: {}", path.display(), e))
        })?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));

        let db = OptimisticTransactionDB::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(storage_err)?;

        tracing::debug!(path = %path.display(), "trust store opened");

        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, TrustError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| TrustError::Storage(format!("column family '{}' not found", name)))
    }

    fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>, TrustError> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key).map_err(storage_err)? {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>, TrustError> {
        let cf = self.cf(cf_name)?;
        self.db
            .iterator_cf(cf, IteratorMode::Start)
            .map(|item| {
                let (_, value) = item.map_err(storage_err)?;
                decode(&value)
            })
            .collect()
    }

    /// Start an optimistic transaction.
    pub fn begin(&self) -> StoreTxn<'_> {
        StoreTxn {
            store: self,
            txn: self.db.transaction(),
        }
    }

    /// Current score record of an identifier.
    pub fn score(&self, did: &Did) -> Result<Option<ScoreRecord>, TrustError> {
        self.get(CF_SCORES, did.as_str().as_bytes())
    }

    /// All score records.
    pub fn scores(&self) -> Result<Vec<ScoreRecord>, TrustError> {
        self.scan(CF_SCORES)
    }

    /// Every identifier known to the score store.
    pub fn dids(&self) -> Result<Vec<Did>, TrustError> {
        Ok(self.scores()?.into_iter().map(|r| r.did).collect())
    }

    /// All policy rules, in storage order.
    pub fn rules(&self) -> Result<Vec<PolicyRule>, TrustError> {
        self.scan(CF_RULES)
    }

    /// The recovery case of an identifier, if any.
    pub fn recovery_case(&self, did: &Did) -> Result<Option<RecoveryCase>, TrustError> {
        self.get(CF_RECOVERY, did.as_str().as_bytes())
    }

    /// Recovery cases currently in the given status.
    pub fn recovery_cases_with(
        &self,
        status: RecoveryStatus,
    ) -> Result<Vec<RecoveryCase>, TrustError> {
        Ok(self
            .scan::<RecoveryCase>(CF_RECOVERY)?
            .into_iter()
            .filter(|case| case.status == status)
            .collect())
    }

    /// Ledger head of an identifier, if it has any entries.
    pub fn ledger_head(&self, did: &Did) -> Result<Option<LedgerHead>, TrustError> {
        self.get(CF_LEDGER, &ledger_head_key(did.as_str()))
    }

    /// Lazily stream an identifier's ledger entries, oldest first.
    pub fn ledger_entries(&self, did: &Did) -> Result<LedgerIter<'_>, TrustError> {
        let cf = self.cf(CF_LEDGER)?;
        let prefix = ledger_prefix(did.as_str());
        let inner = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        Ok(LedgerIter {
            inner,
            prefix,
            done: false,
        })
    }
}

/// Forward iterator over one identifier's raw ledger entries.
pub struct LedgerIter<'a> {
    inner: DBIteratorWithThreadMode<'a, OptimisticTransactionDB>,
    prefix: Vec<u8>,
    done: bool,
}

impl Iterator for LedgerIter<'_> {
    type Item = Result<LedgerEntry, TrustError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next()? {
            Err(e) => {
                self.done = true;
                Some(Err(storage_err(e)))
            }
            Ok((key, value)) => {
                if !key.starts_with(&self.prefix) {
                    self.done = true;
                    return None;
                }
                Some(decode(&value))
            }
        }
    }
}

/// A single optimistic transaction over the trust store.
///
/// Dropping it without calling [`StoreTxn::commit`] discards every write.
pub struct StoreTxn<'a> {
    store: &'a TrustStore,
    txn: Transaction<'a, OptimisticTransactionDB>,
}

impl StoreTxn<'_> {
    fn get_for_update<T: DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
    ) -> Result<Option<T>, TrustError> {
        let cf = self.store.cf(cf_name)?;
        match self
            .txn
            .get_for_update_cf(cf, key, true)
            .map_err(storage_err)?
        {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<(), TrustError> {
        let cf = self.store.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)?;
        self.txn.put_cf(cf, key, bytes).map_err(storage_err)
    }

    fn delete(&self, cf_name: &str, key: &[u8]) -> Result<(), TrustError> {
        let cf = self.store.cf(cf_name)?;
        self.txn.delete_cf(cf, key).map_err(storage_err)
    }

    /// Read a score record and register it for conflict detection.
    pub fn score_for_update(&self, did: &Did) -> Result<Option<ScoreRecord>, TrustError> {
        self.get_for_update(CF_SCORES, did.as_str().as_bytes())
    }

    /// Write a score record. Scores outside `[0, 1]` are refused.
    pub fn put_score(&self, record: &ScoreRecord) -> Result<(), TrustError> {
        record.validate()?;
        self.put(CF_SCORES, record.did.as_str().as_bytes(), record)
    }

    pub fn rule_for_update(&self, name: &str) -> Result<Option<PolicyRule>, TrustError> {
        self.get_for_update(CF_RULES, name.as_bytes())
    }

    pub fn put_rule(&self, rule: &PolicyRule) -> Result<(), TrustError> {
        self.put(CF_RULES, rule.name.as_bytes(), rule)
    }

    pub fn delete_rule(&self, name: &str) -> Result<(), TrustError> {
        self.delete(CF_RULES, name.as_bytes())
    }

    pub fn case_for_update(&self, did: &Did) -> Result<Option<RecoveryCase>, TrustError> {
        self.get_for_update(CF_RECOVERY, did.as_str().as_bytes())
    }

    pub fn put_case(&self, case: &RecoveryCase) -> Result<(), TrustError> {
        self.put(CF_RECOVERY, case.did.as_str().as_bytes(), case)
    }

    pub fn delete_case(&self, did: &Did) -> Result<(), TrustError> {
        self.delete(CF_RECOVERY, did.as_str().as_bytes())
    }

    pub fn ledger_head_for_update(&self, did: &Did) -> Result<Option<LedgerHead>, TrustError> {
        self.get_for_update(CF_LEDGER, &ledger_head_key(did.as_str()))
    }

    /// Write a new ledger entry together with the identifier's updated head.
    pub fn put_ledger_entry(&self, entry: &LedgerEntry, head: &LedgerHead) -> Result<(), TrustError> {
        let did = entry.did.as_str();
        self.put(CF_LEDGER, &ledger_entry_key(did, &entry.timestamp), entry)?;
        self.put(CF_LEDGER, &ledger_head_key(did), head)
    }

    /// Commit all writes. A conflicting concurrent commit surfaces as
    /// [`TrustError::Busy`].
    pub fn commit(self) -> Result<(), TrustError> {
        self.txn.commit().map_err(storage_err)
    }
}
