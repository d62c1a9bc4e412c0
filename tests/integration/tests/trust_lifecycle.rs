//! Integration test: scoring, policy enforcement and recovery across
//! credo-engine and credo-store.

use chrono::{Duration, Utc};

use credo_core::{PolicyAction, PolicyRule, RecoveryStatus};
use credo_engine::{InitiateOutcome, PolicyOutcome, ProofOutcome, RuleChange};
use credo_integration_tests::{did, TestEngine};

async fn seed_standard_rules(t: &TestEngine) {
    for rule in [
        PolicyRule::new("review", 0.3, PolicyAction::Review),
        PolicyRule::new("restrict", 0.4, PolicyAction::Restrict),
        PolicyRule::new("alert", 0.6, PolicyAction::Alert),
    ] {
        assert_eq!(
            t.engine.policy().add_rule(rule).await.unwrap(),
            RuleChange::Added
        );
    }
}

// =========================================================================
// Policy enforcement
// =========================================================================

#[tokio::test]
async fn test_lowest_violated_rule_decides() {
    let t = TestEngine::new(0.25);
    seed_standard_rules(&t).await;
    let alice = did("did:example:alice");

    let score = t.engine.aggregator().aggregate(&alice).await.unwrap();
    assert!((score - 0.25).abs() < 1e-9);

    let outcome = t.engine.policy().evaluate(&alice).await.unwrap();
    match outcome {
        PolicyOutcome::ReviewRequired(rule) => assert_eq!(rule.name, "review"),
        other => panic!("expected ReviewRequired, got {other:?}"),
    }
    assert!(!t.engine.store().score(&alice).unwrap().unwrap().flagged);
}

#[tokio::test]
async fn test_evaluate_unknown_identifier_has_no_effect() {
    let t = TestEngine::new(0.5);
    seed_standard_rules(&t).await;
    let ghost = did("did:example:ghost");

    assert_eq!(
        t.engine.policy().evaluate(&ghost).await.unwrap(),
        PolicyOutcome::NotFound
    );
    assert!(t.engine.store().score(&ghost).unwrap().is_none());
    assert_eq!(t.engine.ledger().len(&ghost).unwrap(), 0);
}

#[tokio::test]
async fn test_rescoring_keeps_flag_until_recovery() {
    let t = TestEngine::new(0.35);
    seed_standard_rules(&t).await;
    let alice = did("did:example:alice");

    t.engine.aggregator().aggregate(&alice).await.unwrap();
    assert!(matches!(
        t.engine.policy().evaluate(&alice).await.unwrap(),
        PolicyOutcome::Restricted(_)
    ));

    // A better score alone does not lift the restriction.
    t.set_signals(&alice, 0.9);
    t.engine.aggregator().aggregate(&alice).await.unwrap();
    let record = t.engine.store().score(&alice).unwrap().unwrap();
    assert!(record.flagged);
    assert!((record.score - 0.9).abs() < 1e-9);
    assert_eq!(
        t.engine.policy().evaluate(&alice).await.unwrap(),
        PolicyOutcome::Passed
    );
    assert!(t.engine.store().score(&alice).unwrap().unwrap().flagged);
}

// =========================================================================
// Recovery
// =========================================================================

#[tokio::test]
async fn test_full_recovery_cycle_with_reflag() {
    let t = TestEngine::new(0.35);
    seed_standard_rules(&t).await;
    let alice = did("did:example:alice");
    let recovery = t.engine.recovery();

    t.engine.aggregator().aggregate(&alice).await.unwrap();
    t.engine.policy().evaluate(&alice).await.unwrap();
    assert!(t.engine.store().score(&alice).unwrap().unwrap().flagged);

    assert!(matches!(
        recovery.initiate(&alice).await.unwrap(),
        InitiateOutcome::Initiated(_)
    ));
    let proof = t.proof_for(&alice);
    let outcome = recovery.submit_proof(&alice, &proof).await.unwrap();
    assert!(matches!(outcome, ProofOutcome::Verified(_)));
    assert!(!t.engine.store().score(&alice).unwrap().unwrap().flagged);
    assert_eq!(
        recovery.case(&alice).unwrap().unwrap().status,
        RecoveryStatus::Verified
    );

    // The score still fails the restrict rule, so the next evaluation
    // restricts again and the old verified case no longer counts.
    assert!(matches!(
        t.engine.policy().evaluate(&alice).await.unwrap(),
        PolicyOutcome::Restricted(_)
    ));
    assert!(t.engine.store().score(&alice).unwrap().unwrap().flagged);
    assert!(recovery.case(&alice).unwrap().is_none());
    assert_eq!(
        recovery.submit_proof(&alice, &proof).await.unwrap(),
        ProofOutcome::NoActiveCase
    );

    assert!(matches!(
        recovery.initiate(&alice).await.unwrap(),
        InitiateOutcome::Initiated(case) if case.status == RecoveryStatus::Pending
    ));
}

#[tokio::test]
async fn test_rejected_proof_leaves_identifier_flagged() {
    let t = TestEngine::new(0.2);
    seed_standard_rules(&t).await;
    let bob = did("did:example:bob");
    let alice = did("did:example:alice");
    let recovery = t.engine.recovery();

    t.engine.aggregator().aggregate(&bob).await.unwrap();
    t.set_signals(&bob, 0.35);
    t.engine.aggregator().aggregate(&bob).await.unwrap();
    t.engine.policy().evaluate(&bob).await.unwrap();
    recovery.initiate(&bob).await.unwrap();

    // A valid proof for a different identifier does not count.
    let outcome = recovery.submit_proof(&bob, &t.proof_for(&alice)).await.unwrap();
    assert!(matches!(outcome, ProofOutcome::Rejected(_)));
    assert!(t.engine.store().score(&bob).unwrap().unwrap().flagged);
    assert_eq!(
        recovery.case(&bob).unwrap().unwrap().status,
        RecoveryStatus::Rejected
    );
}

#[tokio::test]
async fn test_initiate_for_unflagged_identifier() {
    let t = TestEngine::new(0.9);
    seed_standard_rules(&t).await;
    let alice = did("did:example:alice");

    t.engine.aggregator().aggregate(&alice).await.unwrap();
    t.engine.policy().evaluate(&alice).await.unwrap();
    assert_eq!(
        t.engine.recovery().initiate(&alice).await.unwrap(),
        InitiateOutcome::NotFlagged
    );
    assert!(t.engine.recovery().case(&alice).unwrap().is_none());
}

// =========================================================================
// Decay-weighted repair
// =========================================================================

#[tokio::test]
async fn test_repair_of_long_flagged_identifier() {
    let t = TestEngine::new(0.35);
    seed_standard_rules(&t).await;
    let alice = did("did:example:alice");
    let recovery = t.engine.recovery();

    t.engine
        .ledger()
        .append(&alice, 0.35, Utc::now() - Duration::days(200))
        .await
        .unwrap();
    t.set_signals(&alice, 0.5);
    t.engine.aggregator().aggregate(&alice).await.unwrap();

    // Force the flag with a stricter rule, then open a case.
    t.engine
        .policy()
        .add_rule(PolicyRule::new("strict", 0.55, PolicyAction::Restrict))
        .await
        .unwrap();
    assert!(matches!(
        t.engine.policy().evaluate(&alice).await.unwrap(),
        PolicyOutcome::Restricted(rule) if rule.name == "strict"
    ));
    recovery.initiate(&alice).await.unwrap();

    assert_eq!(recovery.decay_rate(&alice).unwrap(), 0.3);

    let report = recovery.repair_sweep().await.unwrap();
    assert_eq!(report.examined, 1);
    assert_eq!(report.acted, 1);

    let record = t.engine.store().score(&alice).unwrap().unwrap();
    assert!((record.score - 0.53).abs() < 1e-9);
    assert!(record.flagged);
    assert_eq!(t.engine.ledger().len(&alice).unwrap(), 3);
    assert_eq!(
        recovery.case(&alice).unwrap().unwrap().status,
        RecoveryStatus::Pending
    );
}
