use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TrustError;
use crate::hashing::ledger_hash;
use crate::recovery_state::RecoveryStatus;

/// Check that a string has the shape `did:<method>:<identifier>`, where the
/// method is `[a-z0-9]+` and the identifier is `[A-Za-z0-9._-]+`.
pub fn is_valid_did(uri: &str) -> bool {
    let Some(rest) = uri.strip_prefix("did:") else {
        return false;
    };
    let Some((method, identifier)) = rest.split_once(':') else {
        return false;
    };
    !method.is_empty()
        && method
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        && !identifier.is_empty()
        && identifier
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'))
}

/// Decentralized Identifier (DID).
///
/// Construction goes through [`Did::parse`], so every `Did` handed to the
/// engine has already passed format validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Did(String);

impl Did {
    /// Validate and wrap a DID URI.
    pub fn parse(uri: impl Into<String>) -> Result<Self, TrustError> {
        let uri = uri.into();
        if !is_valid_did(&uri) {
            return Err(TrustError::InvalidDid(uri));
        }
        Ok(Self(uri))
    }

    /// Get the full DID URI.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the method (e.g. `ethr`, `web`, `key`).
    pub fn method(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or_default()
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Did {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Did {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of a trust signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    /// On-chain proofs (transaction history, attestations).
    OnChain,
    /// Federated trust nodes.
    Federated,
    /// Historical usage patterns.
    Usage,
    /// Social verification signals.
    Social,
}

impl SignalSource {
    /// All sources, in aggregation order.
    pub const ALL: [SignalSource; 4] = [Self::OnChain, Self::Federated, Self::Usage, Self::Social];
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnChain => write!(f, "on_chain"),
            Self::Federated => write!(f, "federated"),
            Self::Usage => write!(f, "usage"),
            Self::Social => write!(f, "social"),
        }
    }
}

/// Current trust state of one identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub did: Did,
    /// Aggregated trust score in `[0.0, 1.0]`.
    pub score: f64,
    /// Set by a restrict rule, cleared by a verified recovery.
    pub flagged: bool,
}

impl ScoreRecord {
    /// A fresh, unflagged record.
    pub fn new(did: Did, score: f64) -> Self {
        Self {
            did,
            score,
            flagged: false,
        }
    }

    /// Check the score invariant before persisting.
    pub fn validate(&self) -> Result<(), TrustError> {
        if !self.score.is_finite() || !(0.0..=1.0).contains(&self.score) {
            return Err(TrustError::InvalidScore(self.score));
        }
        Ok(())
    }
}

/// One self-certifying entry of an identifier's score history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub did: Did,
    pub timestamp: DateTime<Utc>,
    pub score: f64,
    /// hex(BLAKE3(did | score | timestamp)).
    pub integrity_hash: String,
}

impl LedgerEntry {
    /// Build an entry and compute its integrity hash. The timestamp is
    /// truncated to microseconds, the ledger's resolution.
    pub fn seal(did: Did, score: f64, timestamp: DateTime<Utc>) -> Self {
        let timestamp = timestamp.trunc_subsecs(6);
        let integrity_hash = ledger_hash(did.as_str(), score, &timestamp);
        Self {
            did,
            timestamp,
            score,
            integrity_hash,
        }
    }

    /// Recompute the hash from the entry's own fields and compare.
    pub fn verify(&self) -> bool {
        ledger_hash(self.did.as_str(), self.score, &self.timestamp) == self.integrity_hash
    }
}

/// What a policy rule does when an identifier's score falls below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyAction {
    /// Report only.
    Alert,
    /// Flag the identifier as untrusted.
    Restrict,
    /// Report that manual review is required.
    Review,
}

impl fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alert => write!(f, "alert"),
            Self::Restrict => write!(f, "restrict"),
            Self::Review => write!(f, "review"),
        }
    }
}

impl FromStr for PolicyAction {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "alert" => Ok(Self::Alert),
            "restrict" => Ok(Self::Restrict),
            "review" => Ok(Self::Review),
            other => Err(TrustError::InvalidRule(format!("unknown action '{}'", other))),
        }
    }
}

/// A named threshold-action pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub name: String,
    pub min_trust_score: f64,
    pub action: PolicyAction,
}

impl PolicyRule {
    pub fn new(name: impl Into<String>, min_trust_score: f64, action: PolicyAction) -> Self {
        Self {
            name: name.into(),
            min_trust_score,
            action,
        }
    }

    pub fn validate(&self) -> Result<(), TrustError> {
        if self.name.trim().is_empty() {
            return Err(TrustError::InvalidRule("rule name must not be empty".into()));
        }
        if !self.min_trust_score.is_finite() || !(0.0..=1.0).contains(&self.min_trust_score) {
            return Err(TrustError::InvalidRule(format!(
                "rule '{}' threshold {} is outside [0, 1]",
                self.name, self.min_trust_score
            )));
        }
        Ok(())
    }

    /// Whether a score fails this rule's threshold.
    pub fn is_violated_by(&self, score: f64) -> bool {
        score < self.min_trust_score
    }
}

/// Recovery process for a flagged identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryCase {
    pub did: Did,
    /// Free-form progress marker; `"start"` for a freshly initiated case.
    pub stage: String,
    pub last_attempt: DateTime<Utc>,
    pub status: RecoveryStatus,
}

impl RecoveryCase {
    pub const STAGE_START: &'static str = "start";
    pub const STAGE_PROOF_ACCEPTED: &'static str = "proof_accepted";
    pub const STAGE_PROOF_REFUSED: &'static str = "proof_refused";

    /// A new pending case.
    pub fn pending(did: Did, now: DateTime<Utc>) -> Self {
        Self {
            did,
            stage: Self::STAGE_START.into(),
            last_attempt: now,
            status: RecoveryStatus::Pending,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == RecoveryStatus::Pending
    }
}
