use std::sync::Arc;
use std::time::Duration;

use credo_core::{EngineConfig, TrustError};
use credo_store::{PersistenceCoordinator, TrustStore};

use crate::aggregator::Aggregator;
use crate::ledger::Ledger;
use crate::policy::PolicyEngine;
use crate::proof::ProofValidator;
use crate::provider::SignalProviders;
use crate::recovery::RecoveryEngine;
use crate::sweep::{spawn_sweep, SweepHandle};

/// Intervals of the background sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSchedule {
    pub policy: Duration,
    pub repair: Duration,
    /// Periodic re-aggregation of every identifier; off when `None`.
    pub rescore: Option<Duration>,
}

/// All engine components wired to one store.
pub struct TrustEngine {
    coordinator: Arc<PersistenceCoordinator>,
    ledger: Arc<Ledger>,
    aggregator: Arc<Aggregator>,
    policy: Arc<PolicyEngine>,
    recovery: Arc<RecoveryEngine>,
}

impl TrustEngine {
    pub fn new(
        store: Arc<TrustStore>,
        config: &EngineConfig,
        providers: SignalProviders,
        validator: Arc<dyn ProofValidator>,
    ) -> Result<Self, TrustError> {
        config.validate()?;

        let coordinator = Arc::new(PersistenceCoordinator::new(store, config.retry));
        let ledger = Arc::new(Ledger::new(coordinator.clone()));
        let aggregator = Arc::new(Aggregator::new(
            providers,
            config,
            coordinator.clone(),
            ledger.clone(),
        )?);
        let policy = Arc::new(PolicyEngine::new(coordinator.clone()));
        let recovery = Arc::new(RecoveryEngine::new(
            coordinator.clone(),
            ledger.clone(),
            validator,
        ));

        Ok(Self {
            coordinator,
            ledger,
            aggregator,
            policy,
            recovery,
        })
    }

    pub fn store(&self) -> &Arc<TrustStore> {
        self.coordinator.store()
    }

    pub fn coordinator(&self) -> &Arc<PersistenceCoordinator> {
        &self.coordinator
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    pub fn policy(&self) -> &Arc<PolicyEngine> {
        &self.policy
    }

    pub fn recovery(&self) -> &Arc<RecoveryEngine> {
        &self.recovery
    }

    /// Start the background sweeps. Each runs in its own task until its
    /// handle is stopped.
    pub fn spawn_sweeps(&self, schedule: &SweepSchedule) -> Vec<SweepHandle> {
        let mut handles = vec![
            spawn_sweep(self.policy.clone(), schedule.policy),
            spawn_sweep(self.recovery.clone(), schedule.repair),
        ];
        if let Some(period) = schedule.rescore {
            handles.push(spawn_sweep(self.aggregator.clone(), period));
        }
        handles
    }
}
