//! Credo Trust State Engine
//!
//! - Signal aggregation from on-chain, federated, usage and social providers
//! - Self-certifying, append-only score ledger
//! - Ordered policy rules with alert / restrict / review actions
//! - Recovery cases with proof verification and decay-weighted repair
//! - Cancellable periodic sweeps

pub mod aggregator;
pub mod decay;
pub mod engine;
pub mod ledger;
pub mod policy;
pub mod proof;
pub mod provider;
pub mod recovery;
pub mod sweep;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::{Aggregator, SignalBreakdown};
pub use decay::{decay_multiplier, repaired_score};
pub use engine::{SweepSchedule, TrustEngine};
pub use ledger::{Ledger, LedgerHistory, VerifiedEntries};
pub use policy::{PolicyEngine, PolicyOutcome, RuleChange, RuleSet};
pub use proof::{recovery_message, sign_recovery, Ed25519ProofValidator, ProofValidator};
pub use provider::{ProviderError, Signal, SignalProvider, SignalProviders, StaticSignalProvider};
pub use recovery::{InitiateOutcome, ProofOutcome, RecoveryEngine};
pub use sweep::{spawn_sweep, Sweep, SweepHandle, SweepReport};
