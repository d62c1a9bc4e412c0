use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::recovery_state::RecoveryStatus;

/// Broad category of a [`TrustError`], used by callers to decide whether a
/// failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The identifier (or other keyed object) does not exist.
    NotFound,
    /// The request was refused because of its input or the current state.
    Denied,
    /// The storage layer is temporarily unable to serve the request.
    Unavailable,
    /// Persisted data failed an integrity check.
    Integrity,
}

/// Trust engine errors.
#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    #[error("identifier not found: {0}")]
    NotFound(String),

    #[error("storage contention: gave up after {attempts} attempts")]
    StorageContention { attempts: u32 },

    #[error("ledger tampering detected for {did} at {timestamp}")]
    TamperDetected {
        did: String,
        timestamp: DateTime<Utc>,
    },

    #[error("transient storage conflict: {0}")]
    Busy(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid DID format: {0}")]
    InvalidDid(String),

    #[error("trust score out of range [0, 1]: {0}")]
    InvalidScore(f64),

    #[error("invalid policy rule: {0}")]
    InvalidRule(String),

    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        from: RecoveryStatus,
        to: RecoveryStatus,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl TrustError {
    /// Classify this error for the caller.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::StorageContention { .. }
            | Self::Busy(_)
            | Self::Storage(_)
            | Self::Timeout(_) => ErrorClass::Unavailable,
            Self::TamperDetected { .. } | Self::Serialization(_) => ErrorClass::Integrity,
            Self::InvalidDid(_)
            | Self::InvalidScore(_)
            | Self::InvalidRule(_)
            | Self::InvalidStateTransition { .. }
            | Self::Config(_) => ErrorClass::Denied,
        }
    }

    /// Whether the same call may succeed if retried later.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Unavailable
    }

    /// Whether this is a transient lock conflict that the persistence
    /// coordinator should absorb by restarting the transaction.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}
