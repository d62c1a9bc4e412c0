//! Fixtures shared by the unit tests of this crate.

use std::path::PathBuf;
use std::sync::Arc;

use credo_core::{Did, RetryPolicy, ScoreRecord};
use credo_store::{PersistenceCoordinator, TrustStore};

/// A throwaway store, removed when dropped.
pub struct TestStore {
    pub dir: PathBuf,
    pub coordinator: Arc<PersistenceCoordinator>,
}

impl TestStore {
    pub fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("credo-engine-test-{}", rand::random::<u64>()));
        std::fs::create_dir_all(&dir).unwrap();
        let store = Arc::new(TrustStore::open(&dir).unwrap());
        let policy = RetryPolicy {
            max_attempts: 20,
            initial_backoff_ms: 1,
            max_backoff_ms: 8,
        };
        Self {
            dir,
            coordinator: Arc::new(PersistenceCoordinator::new(store, policy)),
        }
    }

    pub fn store(&self) -> &Arc<TrustStore> {
        self.coordinator.store()
    }

    /// Write a score record directly.
    pub fn put_record(&self, did: &Did, score: f64, flagged: bool) {
        let txn = self.store().begin();
        txn.put_score(&ScoreRecord {
            did: did.clone(),
            score,
            flagged,
        })
        .unwrap();
        txn.commit().unwrap();
    }

    pub fn record(&self, did: &Did) -> ScoreRecord {
        self.store().score(did).unwrap().unwrap()
    }
}

impl Drop for TestStore {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.dir).ok();
    }
}

pub fn did(s: &str) -> Did {
    Did::parse(s).unwrap()
}
