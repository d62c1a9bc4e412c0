//! Persistence coordinator: the one place that decides how storage
//! transactions are retried.
//!
//! A transaction body is a plain closure over a [`StoreTxn`]. It runs to
//! completion and commits without any `.await` in between, so a caller that
//! drops the surrounding future can never leave a half-applied update. When
//! the commit loses a conflict against another writer, the whole body is
//! re-run on a fresh transaction after a capped exponential backoff.

use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use credo_core::{RetryPolicy, TrustError};

use crate::store::{StoreTxn, TrustStore};

/// Runs transaction bodies against the trust store with bounded retry.
pub struct PersistenceCoordinator {
    store: Arc<TrustStore>,
    policy: RetryPolicy,
}

impl PersistenceCoordinator {
    pub fn new(store: Arc<TrustStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// The underlying store, for read-only access outside a transaction.
    pub fn store(&self) -> &Arc<TrustStore> {
        &self.store
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run `body` inside a transaction and commit it.
    ///
    /// Transient conflicts (from the body's reads or from the commit) restart
    /// the body. After `max_attempts` attempts the call fails with
    /// [`TrustError::StorageContention`]. Any other error is returned as-is
    /// and the transaction is discarded.
    pub async fn with_transaction<T, F>(&self, label: &str, mut body: F) -> Result<T, TrustError>
    where
        F: FnMut(&StoreTxn<'_>) -> Result<T, TrustError>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.attempt(&mut body) {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(label, attempt, "transaction committed after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() => {
                    if attempt >= self.policy.max_attempts {
                        tracing::warn!(
                            label,
                            attempts = attempt,
                            error = %e,
                            "transaction retry budget exhausted"
                        );
                        return Err(TrustError::StorageContention { attempts: attempt });
                    }
                    let delay = self.backoff_with_jitter(attempt - 1);
                    tracing::debug!(
                        label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transaction conflict, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn attempt<T, F>(&self, body: &mut F) -> Result<T, TrustError>
    where
        F: FnMut(&StoreTxn<'_>) -> Result<T, TrustError>,
    {
        let txn = self.store.begin();
        let value = body(&txn)?;
        txn.commit()?;
        Ok(value)
    }

    /// Exponential backoff plus up to 50% random jitter, so writers that
    /// collided once do not collide again in lockstep.
    fn backoff_with_jitter(&self, retry: u32) -> Duration {
        let base = self.policy.backoff(retry);
        let spread = base.as_millis() as u64 / 2;
        let jitter = rand::thread_rng().gen_range(0..=spread);
        base + Duration::from_millis(jitter)
    }
}

/// Bound an on-demand call. The inner future is dropped when the limit
/// elapses and the caller receives [`TrustError::Timeout`].
pub async fn with_deadline<T, F>(limit: Duration, fut: F) -> Result<T, TrustError>
where
    F: Future<Output = Result<T, TrustError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(TrustError::Timeout(limit)),
    }
}
