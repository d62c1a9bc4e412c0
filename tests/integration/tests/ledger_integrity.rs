//! Integration test: ledger history, persistence and tamper detection.

use chrono::{Duration, Utc};
use std::sync::Arc;

use credo_core::{LedgerEntry, RetryPolicy, TrustError};
use credo_engine::Ledger;
use credo_integration_tests::{did, TestEngine};
use credo_store::{LedgerHead, TrustStore};

#[tokio::test]
async fn test_every_aggregation_is_recorded() {
    let t = TestEngine::new(0.5);
    let alice = did("did:example:alice");

    for score in [0.5, 0.7, 0.2] {
        t.set_signals(&alice, score);
        t.engine.aggregator().aggregate(&alice).await.unwrap();
    }

    let entries: Vec<LedgerEntry> = t
        .engine
        .ledger()
        .history(&alice)
        .iter()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(entries.len(), 3);
    assert!(entries.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    assert!(entries.iter().all(Ledger::verify));

    let last = t.engine.store().score(&alice).unwrap().unwrap();
    assert_eq!(entries[2].score, last.score);
}

#[tokio::test]
async fn test_history_survives_reopen() {
    let dir = std::env::temp_dir().join(format!("credo-it-reopen-{}", rand::random::<u64>()));
    let alice = did("did:example:alice");

    {
        let store = Arc::new(TrustStore::open(&dir).unwrap());
        let t = TestEngine::on_store(dir.join("unused"), store, 0.6, RetryPolicy::default());
        t.engine.aggregator().aggregate(&alice).await.unwrap();
        t.engine.aggregator().aggregate(&alice).await.unwrap();
    }

    let store = Arc::new(TrustStore::open(&dir).unwrap());
    let t = TestEngine::on_store(dir.clone(), store, 0.6, RetryPolicy::default());
    assert_eq!(t.engine.ledger().len(&alice).unwrap(), 2);
    assert_eq!(t.engine.ledger().verify_history(&alice).unwrap(), 2);

    // Appends after reopening continue after the stored head.
    let stale = Utc::now() - Duration::days(1);
    t.engine.ledger().append(&alice, 0.1, stale).await.unwrap();
    let entries: Vec<LedgerEntry> = t
        .engine
        .ledger()
        .history(&alice)
        .iter()
        .unwrap()
        .map(|e| e.unwrap())
        .collect();
    assert_eq!(entries.len(), 3);
    assert!(entries[2].timestamp > entries[1].timestamp);
}

#[tokio::test]
async fn test_tampering_is_reported_not_corrected() {
    let t = TestEngine::new(0.6);
    let alice = did("did:example:alice");
    t.engine.aggregator().aggregate(&alice).await.unwrap();

    // Rewrite the stored entry with a different score but the original hash.
    let original = t
        .engine
        .ledger()
        .oldest(&alice)
        .unwrap()
        .expect("one entry");
    let mut forged = original.clone();
    forged.score = 0.99;
    let txn = t.engine.store().begin();
    txn.put_ledger_entry(
        &forged,
        &LedgerHead {
            last_timestamp: forged.timestamp,
            entries: 1,
        },
    )
    .unwrap();
    txn.commit().unwrap();

    let history = t.engine.ledger().history(&alice);
    for _ in 0..2 {
        let first = history.iter().unwrap().next().unwrap();
        assert!(matches!(
            first,
            Err(TrustError::TamperDetected { did: ref tampered, timestamp })
                if tampered == alice.as_str() && timestamp == original.timestamp
        ));
    }
    assert_eq!(
        t.engine
            .ledger()
            .verify_history(&alice)
            .unwrap_err()
            .class(),
        credo_core::ErrorClass::Integrity
    );

    // The stored bytes are left exactly as found.
    let raw = t
        .engine
        .store()
        .ledger_entries(&alice)
        .unwrap()
        .next()
        .unwrap()
        .unwrap();
    assert_eq!(raw, forged);
}

#[tokio::test]
async fn test_histories_are_isolated_per_identifier() {
    let t = TestEngine::new(0.6);
    let a = did("did:example:a");
    let ab = did("did:example:ab");

    t.engine.aggregator().aggregate(&a).await.unwrap();
    t.engine.aggregator().aggregate(&ab).await.unwrap();
    t.engine.aggregator().aggregate(&ab).await.unwrap();

    assert_eq!(t.engine.ledger().history(&a).iter().unwrap().count(), 1);
    assert_eq!(t.engine.ledger().history(&ab).iter().unwrap().count(), 2);
}
