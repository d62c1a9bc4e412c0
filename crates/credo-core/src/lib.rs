//! Credo Core: Fundamental types, errors, and configuration for the
//! Credo trust reputation engine.

pub mod config;
pub mod error;
pub mod hashing;
pub mod recovery_state;
pub mod types;

pub use config::{EngineConfig, RetryPolicy, SignalWeights};
pub use error::{ErrorClass, TrustError};
pub use recovery_state::{RecoveryEvent, RecoveryStateMachine, RecoveryStatus};
pub use types::{
    is_valid_did, Did, LedgerEntry, PolicyAction, PolicyRule, RecoveryCase, ScoreRecord,
    SignalSource,
};
