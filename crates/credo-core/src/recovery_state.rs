use std::fmt;

use crate::error::TrustError;

/// The states of a trust recovery case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryStatus {
    /// Recovery has been requested and is awaiting proof.
    Pending,
    /// Proof was accepted and the identifier was unflagged. Final state.
    Verified,
    /// Proof was refused; the identifier stays restricted. Final state.
    Rejected,
}

impl RecoveryStatus {
    /// Whether this is a final (terminal) state for the case instance.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Verified | Self::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RecoveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Verified => write!(f, "Verified"),
            Self::Rejected => write!(f, "Rejected"),
        }
    }
}

/// Events that trigger recovery state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryEvent {
    /// The submitted proof was accepted.
    ProofAccepted,
    /// The submitted proof was refused.
    ProofRefused,
}

/// Recovery case transitions.
///
/// Valid transitions:
/// - Pending → Verified (ProofAccepted)
/// - Pending → Rejected (ProofRefused)
///
/// A new case always starts in `Pending`; it is created rather than
/// transitioned into.
pub struct RecoveryStateMachine;

impl RecoveryStateMachine {
    /// Attempt a state transition based on an event.
    pub fn transition(
        current: RecoveryStatus,
        event: RecoveryEvent,
    ) -> Result<RecoveryStatus, TrustError> {
        let new_state = match (current, event) {
            (RecoveryStatus::Pending, RecoveryEvent::ProofAccepted) => RecoveryStatus::Verified,
            (RecoveryStatus::Pending, RecoveryEvent::ProofRefused) => RecoveryStatus::Rejected,
            _ => {
                let target = match event {
                    RecoveryEvent::ProofAccepted => RecoveryStatus::Verified,
                    RecoveryEvent::ProofRefused => RecoveryStatus::Rejected,
                };
                return Err(TrustError::InvalidStateTransition {
                    from: current,
                    to: target,
                });
            }
        };

        tracing::debug!(
            from = %current,
            to = %new_state,
            event = ?event,
            "recovery state transition"
        );

        Ok(new_state)
    }

    /// Check whether an event is applicable without performing it.
    pub fn can_transition(current: RecoveryStatus, event: RecoveryEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}
