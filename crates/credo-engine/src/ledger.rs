//! Append-only, self-certifying score ledger.
//!
//! Every entry carries `hex(BLAKE3(did | score | timestamp))` and can be
//! verified on its own. Entries are never rewritten; reading history
//! re-verifies each one and reports a mismatch as
//! [`TrustError::TamperDetected`].

use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::sync::Arc;

use credo_core::{Did, LedgerEntry, TrustError};
use credo_store::{LedgerHead, LedgerIter, PersistenceCoordinator, StoreTxn, TrustStore};

/// Score history of every identifier.
pub struct Ledger {
    coordinator: Arc<PersistenceCoordinator>,
}

impl Ledger {
    pub fn new(coordinator: Arc<PersistenceCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Append an entry inside a caller's transaction.
    ///
    /// The identifier's ledger head is read for update, so two transactions
    /// appending for the same identifier cannot both commit. A timestamp that
    /// is not after the previous entry is moved to one microsecond past it.
    pub fn append_in(
        &self,
        txn: &StoreTxn<'_>,
        did: &Did,
        score: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<LedgerEntry, TrustError> {
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(TrustError::InvalidScore(score));
        }

        let mut timestamp = timestamp.trunc_subsecs(6);
        let entries = match txn.ledger_head_for_update(did)? {
            Some(head) => {
                if timestamp <= head.last_timestamp {
                    timestamp = head.last_timestamp + Duration::microseconds(1);
                }
                head.entries + 1
            }
            None => 1,
        };

        let entry = LedgerEntry::seal(did.clone(), score, timestamp);
        txn.put_ledger_entry(
            &entry,
            &LedgerHead {
                last_timestamp: entry.timestamp,
                entries,
            },
        )?;

        tracing::debug!(
            did = %did,
            score,
            timestamp = %entry.timestamp,
            hash = %entry.integrity_hash,
            "ledger entry staged"
        );
        Ok(entry)
    }

    /// Append an entry in its own transaction and return its integrity hash.
    pub async fn append(
        &self,
        did: &Did,
        score: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<String, TrustError> {
        let entry = self
            .coordinator
            .with_transaction("ledger_append", |txn| {
                self.append_in(txn, did, score, timestamp)
            })
            .await?;
        Ok(entry.integrity_hash)
    }

    /// A restartable view of an identifier's history, oldest first.
    pub fn history(&self, did: &Did) -> LedgerHistory<'_> {
        LedgerHistory {
            store: self.coordinator.store(),
            did: did.clone(),
        }
    }

    /// The identifier's first entry, if any.
    pub fn oldest(&self, did: &Did) -> Result<Option<LedgerEntry>, TrustError> {
        self.history(did).iter()?.next().transpose()
    }

    /// Recompute an entry's hash and compare it with the stored one.
    pub fn verify(entry: &LedgerEntry) -> bool {
        entry.verify()
    }

    /// Walk the full history, failing on the first tampered entry. Returns
    /// the number of verified entries.
    pub fn verify_history(&self, did: &Did) -> Result<u64, TrustError> {
        let mut count = 0;
        for entry in self.history(did).iter()? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    /// Number of entries recorded for an identifier.
    pub fn len(&self, did: &Did) -> Result<u64, TrustError> {
        Ok(self
            .coordinator
            .store()
            .ledger_head(did)?
            .map(|head| head.entries)
            .unwrap_or(0))
    }
}

/// History handle for one identifier. Each call to [`LedgerHistory::iter`]
/// starts a fresh pass over the stored entries.
pub struct LedgerHistory<'a> {
    store: &'a TrustStore,
    did: Did,
}

impl<'a> LedgerHistory<'a> {
    /// Stream verified entries, oldest first.
    pub fn iter(&self) -> Result<VerifiedEntries<'a>, TrustError> {
        Ok(VerifiedEntries {
            inner: self.store.ledger_entries(&self.did)?,
        })
    }
}

/// Iterator that checks every entry's integrity hash as it is read.
pub struct VerifiedEntries<'a> {
    inner: LedgerIter<'a>,
}

impl Iterator for VerifiedEntries<'_> {
    type Item = Result<LedgerEntry, TrustError>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = match self.inner.next()? {
            Ok(entry) => entry,
            Err(e) => return Some(Err(e)),
        };
        if entry.verify() {
            return Some(Ok(entry));
        }
        tracing::error!(
            did = %entry.did,
            timestamp = %entry.timestamp,
            "ledger entry failed integrity check"
        );
        Some(Err(TrustError::TamperDetected {
            did: entry.did.to_string(),
            timestamp: entry.timestamp,
        }))
    }
}
