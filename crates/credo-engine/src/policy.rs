//! Policy rules and their enforcement.
//!
//! Rules are evaluated in ascending threshold order (ties broken by name).
//! The first rule whose threshold the score falls below decides the outcome;
//! later rules are not consulted.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;

use credo_core::{Did, PolicyAction, PolicyRule, RecoveryStatus, TrustError};
use credo_store::{PersistenceCoordinator, StoreTxn};

use crate::sweep::{Sweep, SweepReport};

/// Result of evaluating one identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyOutcome {
    /// The identifier has no score record.
    NotFound,
    Alert(PolicyRule),
    Restricted(PolicyRule),
    ReviewRequired(PolicyRule),
    Passed,
}

impl PolicyOutcome {
    /// The rule that fired, if any.
    pub fn rule(&self) -> Option<&PolicyRule> {
        match self {
            Self::Alert(rule) | Self::Restricted(rule) | Self::ReviewRequired(rule) => Some(rule),
            Self::NotFound | Self::Passed => None,
        }
    }
}

/// Result of adding a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleChange {
    Added,
    /// A rule with the same name exists; nothing was written.
    DuplicateRule,
}

fn evaluation_order(a: &PolicyRule, b: &PolicyRule) -> Ordering {
    a.min_trust_score
        .total_cmp(&b.min_trust_score)
        .then_with(|| a.name.cmp(&b.name))
}

/// A snapshot of the rule table in evaluation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<PolicyRule>,
}

impl RuleSet {
    pub fn new(mut rules: Vec<PolicyRule>) -> Self {
        rules.sort_by(evaluation_order);
        Self { rules }
    }

    /// The first rule the score violates.
    pub fn first_violation(&self, score: f64) -> Option<&PolicyRule> {
        self.rules.iter().find(|rule| rule.is_violated_by(score))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PolicyRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Evaluates identifiers against the stored rule table.
pub struct PolicyEngine {
    coordinator: Arc<PersistenceCoordinator>,
}

impl PolicyEngine {
    pub fn new(coordinator: Arc<PersistenceCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Store a new rule. A rule whose name is taken is not written.
    pub async fn add_rule(&self, rule: PolicyRule) -> Result<RuleChange, TrustError> {
        rule.validate()?;

        let change = self
            .coordinator
            .with_transaction("add_rule", |txn| {
                if txn.rule_for_update(&rule.name)?.is_some() {
                    return Ok(RuleChange::DuplicateRule);
                }
                txn.put_rule(&rule)?;
                Ok(RuleChange::Added)
            })
            .await?;

        match change {
            RuleChange::Added => tracing::info!(
                rule = %rule.name,
                min_trust_score = rule.min_trust_score,
                action = %rule.action,
                "policy rule added"
            ),
            RuleChange::DuplicateRule => {
                tracing::warn!(rule = %rule.name, "policy rule already exists")
            }
        }
        Ok(change)
    }

    /// Delete a rule by name. Returns whether it existed.
    pub async fn remove_rule(&self, name: &str) -> Result<bool, TrustError> {
        let removed = self
            .coordinator
            .with_transaction("remove_rule", |txn| {
                if txn.rule_for_update(name)?.is_none() {
                    return Ok(false);
                }
                txn.delete_rule(name)?;
                Ok(true)
            })
            .await?;
        if removed {
            tracing::info!(rule = name, "policy rule removed");
        }
        Ok(removed)
    }

    /// Current rules in evaluation order.
    pub fn rules(&self) -> Result<RuleSet, TrustError> {
        Ok(RuleSet::new(self.coordinator.store().rules()?))
    }

    /// Evaluate an identifier against the current rules.
    pub async fn evaluate(&self, did: &Did) -> Result<PolicyOutcome, TrustError> {
        let rules = self.rules()?;
        self.evaluate_with(did, &rules).await
    }

    /// Evaluate an identifier against a rule snapshot.
    pub async fn evaluate_with(
        &self,
        did: &Did,
        rules: &RuleSet,
    ) -> Result<PolicyOutcome, TrustError> {
        let outcome = self
            .coordinator
            .with_transaction("evaluate", |txn| apply_rules(txn, did, rules))
            .await?;

        match &outcome {
            PolicyOutcome::NotFound => {
                tracing::warn!(did = %did, "policy evaluation for unknown identifier")
            }
            PolicyOutcome::Passed => tracing::debug!(did = %did, "policy passed"),
            PolicyOutcome::Alert(rule) => {
                tracing::warn!(did = %did, rule = %rule.name, "policy alert")
            }
            PolicyOutcome::ReviewRequired(rule) => {
                tracing::warn!(did = %did, rule = %rule.name, "manual review required")
            }
            PolicyOutcome::Restricted(rule) => {
                tracing::warn!(did = %did, rule = %rule.name, "identifier restricted")
            }
        }
        Ok(outcome)
    }

    /// Evaluate every known identifier against one rule snapshot.
    pub async fn sweep(&self) -> Result<SweepReport, TrustError> {
        let rules = self.rules()?;
        let dids = self.coordinator.store().dids()?;
        let mut report = SweepReport::default();

        for did in dids {
            report.examined += 1;
            match self.evaluate_with(&did, &rules).await {
                Ok(outcome) => {
                    if outcome.rule().is_some() {
                        report.acted += 1;
                    }
                }
                Err(e) => {
                    tracing::error!(did = %did, error = %e, "policy evaluation failed");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}

fn apply_rules(
    txn: &StoreTxn<'_>,
    did: &Did,
    rules: &RuleSet,
) -> Result<PolicyOutcome, TrustError> {
    let Some(mut record) = txn.score_for_update(did)? else {
        return Ok(PolicyOutcome::NotFound);
    };
    let Some(rule) = rules.first_violation(record.score) else {
        return Ok(PolicyOutcome::Passed);
    };

    let outcome = match rule.action {
        PolicyAction::Alert => PolicyOutcome::Alert(rule.clone()),
        PolicyAction::Review => PolicyOutcome::ReviewRequired(rule.clone()),
        PolicyAction::Restrict => {
            if !record.flagged {
                record.flagged = true;
                txn.put_score(&record)?;
                // A verified case belonged to the previous restriction; a new
                // one must be initiated.
                if let Some(case) = txn.case_for_update(did)? {
                    if case.status == RecoveryStatus::Verified {
                        txn.delete_case(did)?;
                    }
                }
            }
            PolicyOutcome::Restricted(rule.clone())
        }
    };
    Ok(outcome)
}

#[async_trait]
impl Sweep for PolicyEngine {
    fn name(&self) -> &'static str {
        "policy_enforcement"
    }

    async fn run_once(&self) -> Result<SweepReport, TrustError> {
        self.sweep().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{did, TestStore};
    use chrono::Utc;
    use credo_core::RecoveryCase;

    async fn seed_rules(policy: &PolicyEngine) {
        for rule in [
            PolicyRule::new("review", 0.3, PolicyAction::Review),
            PolicyRule::new("restrict", 0.4, PolicyAction::Restrict),
            PolicyRule::new("alert", 0.6, PolicyAction::Alert),
        ] {
            assert_eq!(policy.add_rule(rule).await.unwrap(), RuleChange::Added);
        }
    }

    #[test]
    fn test_rule_set_ordering() {
        let rules = RuleSet::new(vec![
            PolicyRule::new("b", 0.5, PolicyAction::Alert),
            PolicyRule::new("c", 0.2, PolicyAction::Review),
            PolicyRule::new("a", 0.5, PolicyAction::Restrict),
        ]);
        let names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
        assert_eq!(rules.first_violation(0.3).unwrap().name, "a");
        assert!(rules.first_violation(0.5).is_none());
    }

    #[tokio::test]
    async fn test_lowest_threshold_rule_wins() {
        let t = TestStore::new();
        let policy = PolicyEngine::new(t.coordinator.clone());
        seed_rules(&policy).await;
        let alice = did("did:example:alice");
        t.put_record(&alice, 0.25, false);

        let outcome = policy.evaluate(&alice).await.unwrap();
        assert!(matches!(&outcome, PolicyOutcome::ReviewRequired(rule) if rule.name == "review"));
        assert!(!t.record(&alice).flagged);
    }

    #[tokio::test]
    async fn test_alert_and_pass() {
        let t = TestStore::new();
        let policy = PolicyEngine::new(t.coordinator.clone());
        seed_rules(&policy).await;
        let alice = did("did:example:alice");

        t.put_record(&alice, 0.5, false);
        assert!(matches!(policy.evaluate(&alice).await.unwrap(), PolicyOutcome::Alert(_)));
        assert!(!t.record(&alice).flagged);

        t.put_record(&alice, 0.6, false);
        assert_eq!(policy.evaluate(&alice).await.unwrap(), PolicyOutcome::Passed);
    }

    #[tokio::test]
    async fn test_restrict_is_idempotent() {
        let t = TestStore::new();
        let policy = PolicyEngine::new(t.coordinator.clone());
        seed_rules(&policy).await;
        let alice = did("did:example:alice");
        t.put_record(&alice, 0.35, false);

        let first = policy.evaluate(&alice).await.unwrap();
        let second = policy.evaluate(&alice).await.unwrap();
        assert!(matches!(first, PolicyOutcome::Restricted(_)));
        assert_eq!(first, second);
        assert!(t.record(&alice).flagged);
    }

    #[tokio::test]
    async fn test_unknown_identifier() {
        let t = TestStore::new();
        let policy = PolicyEngine::new(t.coordinator.clone());
        seed_rules(&policy).await;
        let outcome = policy.evaluate(&did("did:example:ghost")).await.unwrap();
        assert_eq!(outcome, PolicyOutcome::NotFound);
        assert!(t.store().dids().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_rules_passes() {
        let t = TestStore::new();
        let policy = PolicyEngine::new(t.coordinator.clone());
        let alice = did("did:example:alice");
        t.put_record(&alice, 0.0, false);
        assert_eq!(policy.evaluate(&alice).await.unwrap(), PolicyOutcome::Passed);
    }

    #[tokio::test]
    async fn test_duplicate_and_invalid_rules() {
        let t = TestStore::new();
        let policy = PolicyEngine::new(t.coordinator.clone());

        let rule = PolicyRule::new("low", 0.4, PolicyAction::Restrict);
        assert_eq!(policy.add_rule(rule).await.unwrap(), RuleChange::Added);
        let again = PolicyRule::new("low", 0.9, PolicyAction::Alert);
        assert_eq!(policy.add_rule(again).await.unwrap(), RuleChange::DuplicateRule);

        let rules = policy.rules().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.iter().next().unwrap().min_trust_score, 0.4);

        let invalid = PolicyRule::new("high", 1.5, PolicyAction::Alert);
        assert!(matches!(
            policy.add_rule(invalid).await,
            Err(TrustError::InvalidRule(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_rule() {
        let t = TestStore::new();
        let policy = PolicyEngine::new(t.coordinator.clone());
        seed_rules(&policy).await;

        assert!(policy.remove_rule("alert").await.unwrap());
        assert!(!policy.remove_rule("alert").await.unwrap());
        assert_eq!(policy.rules().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reflag_retires_verified_case() {
        let t = TestStore::new();
        let policy = PolicyEngine::new(t.coordinator.clone());
        seed_rules(&policy).await;
        let alice = did("did:example:alice");
        t.put_record(&alice, 0.35, false);

        let mut verified = RecoveryCase::pending(alice.clone(), Utc::now());
        verified.status = RecoveryStatus::Verified;
        let txn = t.store().begin();
        txn.put_case(&verified).unwrap();
        txn.commit().unwrap();

        policy.evaluate(&alice).await.unwrap();
        assert!(t.record(&alice).flagged);
        assert!(t.store().recovery_case(&alice).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restrict_keeps_pending_case() {
        let t = TestStore::new();
        let policy = PolicyEngine::new(t.coordinator.clone());
        seed_rules(&policy).await;
        let alice = did("did:example:alice");
        t.put_record(&alice, 0.35, false);

        let txn = t.store().begin();
        txn.put_case(&RecoveryCase::pending(alice.clone(), Utc::now())).unwrap();
        txn.commit().unwrap();

        policy.evaluate(&alice).await.unwrap();
        let case = t.store().recovery_case(&alice).unwrap().unwrap();
        assert_eq!(case.status, RecoveryStatus::Pending);
    }

    #[tokio::test]
    async fn test_sweep_counts_outcomes() {
        let t = TestStore::new();
        let policy = PolicyEngine::new(t.coordinator.clone());
        seed_rules(&policy).await;
        t.put_record(&did("did:example:a"), 0.1, false);
        t.put_record(&did("did:example:b"), 0.35, false);
        t.put_record(&did("did:example:c"), 0.9, false);

        let report = policy.sweep().await.unwrap();
        assert_eq!(report.examined, 3);
        assert_eq!(report.acted, 2);
        assert_eq!(report.failed, 0);
        assert!(t.record(&did("did:example:b")).flagged);
        assert!(!t.record(&did("did:example:c")).flagged);
    }
}
