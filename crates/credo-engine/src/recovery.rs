//! Recovery of flagged identifiers.
//!
//! A flagged identifier opens a `Pending` case with [`RecoveryEngine::initiate`].
//! The case ends when a proof is submitted: an accepted proof verifies the
//! case and clears the flag in the same transaction, a refused one rejects
//! it. While a case is pending, the repair sweep nudges the score upward by
//! a decay-weighted step.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use credo_core::{
    Did, RecoveryCase, RecoveryEvent, RecoveryStateMachine, RecoveryStatus, TrustError,
};
use credo_store::PersistenceCoordinator;

use crate::decay::{decay_multiplier, repaired_score};
use crate::ledger::Ledger;
use crate::proof::ProofValidator;
use crate::sweep::{Sweep, SweepReport};

/// Result of [`RecoveryEngine::initiate`].
#[derive(Debug, Clone, PartialEq)]
pub enum InitiateOutcome {
    /// A pending case now exists (new or refreshed).
    Initiated(RecoveryCase),
    /// The identifier is unknown or not flagged; nothing changed.
    NotFlagged,
}

/// Result of [`RecoveryEngine::submit_proof`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProofOutcome {
    /// Proof accepted; the identifier is no longer flagged.
    Verified(RecoveryCase),
    /// Proof refused; the flag stays.
    Rejected(RecoveryCase),
    /// No pending case to submit against; nothing changed.
    NoActiveCase,
}

pub struct RecoveryEngine {
    coordinator: Arc<PersistenceCoordinator>,
    ledger: Arc<Ledger>,
    validator: Arc<dyn ProofValidator>,
}

impl RecoveryEngine {
    pub fn new(
        coordinator: Arc<PersistenceCoordinator>,
        ledger: Arc<Ledger>,
        validator: Arc<dyn ProofValidator>,
    ) -> Self {
        Self {
            coordinator,
            ledger,
            validator,
        }
    }

    /// The identifier's current case, whatever its status.
    pub fn case(&self, did: &Did) -> Result<Option<RecoveryCase>, TrustError> {
        self.coordinator.store().recovery_case(did)
    }

    /// Open (or refresh) a pending case for a flagged identifier.
    pub async fn initiate(&self, did: &Did) -> Result<InitiateOutcome, TrustError> {
        let outcome = self
            .coordinator
            .with_transaction("recovery_initiate", |txn| {
                let flagged = txn
                    .score_for_update(did)?
                    .map(|record| record.flagged)
                    .unwrap_or(false);
                if !flagged {
                    return Ok(InitiateOutcome::NotFlagged);
                }

                let now = Utc::now();
                let case = match txn.case_for_update(did)? {
                    Some(mut case) if case.is_active() => {
                        case.stage = RecoveryCase::STAGE_START.into();
                        case.last_attempt = now;
                        case
                    }
                    _ => RecoveryCase::pending(did.clone(), now),
                };
                txn.put_case(&case)?;
                Ok(InitiateOutcome::Initiated(case))
            })
            .await?;

        match &outcome {
            InitiateOutcome::Initiated(_) => tracing::info!(did = %did, "recovery initiated"),
            InitiateOutcome::NotFlagged => {
                tracing::debug!(did = %did, "recovery not needed, identifier is not flagged")
            }
        }
        Ok(outcome)
    }

    /// Submit a recovery proof against the identifier's pending case.
    ///
    /// The proof is validated before any transaction is opened. If the case
    /// was resolved by someone else in the meantime, the submission is
    /// answered with [`ProofOutcome::NoActiveCase`].
    pub async fn submit_proof(&self, did: &Did, proof: &[u8]) -> Result<ProofOutcome, TrustError> {
        if !self.case(did)?.is_some_and(|case| case.is_active()) {
            tracing::debug!(did = %did, "proof submitted without an active case");
            return Ok(ProofOutcome::NoActiveCase);
        }

        let accepted = self.validator.validate(did, proof).await;
        let event = if accepted {
            RecoveryEvent::ProofAccepted
        } else {
            RecoveryEvent::ProofRefused
        };

        let outcome = self
            .coordinator
            .with_transaction("recovery_submit", |txn| {
                let Some(mut case) = txn.case_for_update(did)?.filter(|case| case.is_active())
                else {
                    return Ok(ProofOutcome::NoActiveCase);
                };

                case.status = RecoveryStateMachine::transition(case.status, event)?;
                case.last_attempt = Utc::now();
                if accepted {
                    case.stage = RecoveryCase::STAGE_PROOF_ACCEPTED.into();
                    if let Some(mut record) = txn.score_for_update(did)? {
                        record.flagged = false;
                        txn.put_score(&record)?;
                    }
                } else {
                    case.stage = RecoveryCase::STAGE_PROOF_REFUSED.into();
                }
                txn.put_case(&case)?;

                Ok(if accepted {
                    ProofOutcome::Verified(case)
                } else {
                    ProofOutcome::Rejected(case)
                })
            })
            .await?;

        match &outcome {
            ProofOutcome::Verified(_) => {
                tracing::info!(did = %did, "recovery verified, identifier unflagged")
            }
            ProofOutcome::Rejected(_) => tracing::warn!(did = %did, "recovery proof rejected"),
            ProofOutcome::NoActiveCase => {
                tracing::debug!(did = %did, "case resolved while proof was being validated")
            }
        }
        Ok(outcome)
    }

    /// Current decay multiplier of an identifier.
    pub fn decay_rate(&self, did: &Did) -> Result<f64, TrustError> {
        self.decay_rate_at(did, Utc::now())
    }

    /// Decay multiplier as of `now`.
    pub fn decay_rate_at(&self, did: &Did, now: DateTime<Utc>) -> Result<f64, TrustError> {
        let flagged = self
            .coordinator
            .store()
            .score(did)?
            .map(|record| record.flagged)
            .unwrap_or(false);
        let oldest = self.ledger.oldest(did)?;
        Ok(decay_multiplier(flagged, oldest.map(|entry| now - entry.timestamp)))
    }

    /// Apply one repair step to an identifier with a pending case. Returns
    /// the new score, or `None` when there is nothing to repair.
    pub async fn repair(&self, did: &Did) -> Result<Option<f64>, TrustError> {
        let oldest = self.ledger.oldest(did)?;
        let now = Utc::now();

        let repaired = self
            .coordinator
            .with_transaction("recovery_repair", |txn| {
                if !txn.case_for_update(did)?.is_some_and(|case| case.is_active()) {
                    return Ok(None);
                }
                let Some(mut record) = txn.score_for_update(did)? else {
                    return Ok(None);
                };

                let multiplier =
                    decay_multiplier(record.flagged, oldest.as_ref().map(|e| now - e.timestamp));
                record.score = repaired_score(record.score, multiplier);
                txn.put_score(&record)?;
                self.ledger.append_in(txn, did, record.score, now)?;
                Ok(Some((record.score, multiplier)))
            })
            .await?;

        Ok(repaired.map(|(score, multiplier)| {
            tracing::info!(did = %did, score, multiplier, "trust score repaired");
            score
        }))
    }

    /// Apply one repair step to every identifier with a pending case.
    pub async fn repair_sweep(&self) -> Result<SweepReport, TrustError> {
        let cases = self
            .coordinator
            .store()
            .recovery_cases_with(RecoveryStatus::Pending)?;
        let mut report = SweepReport::default();

        for case in cases {
            report.examined += 1;
            match self.repair(&case.did).await {
                Ok(Some(_)) => report.acted += 1,
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(did = %case.did, error = %e, "repair step failed");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}

#[async_trait]
impl Sweep for RecoveryEngine {
    fn name(&self) -> &'static str {
        "recovery_repair"
    }

    async fn run_once(&self) -> Result<SweepReport, TrustError> {
        self.repair_sweep().await
    }
}
