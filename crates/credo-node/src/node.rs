//! The Credo node orchestrator.
//!
//! Opens the trust store, wires the engine components together, seeds the
//! configured policy rules and runs the background sweeps.

use anyhow::Result;
use std::sync::Arc;

use credo_engine::{RuleChange, SweepHandle, TrustEngine};
use credo_store::TrustStore;

use crate::config::CredoConfig;

/// A Credo node backed by one trust store.
pub struct CredoNode {
    config: CredoConfig,
    engine: TrustEngine,
    sweeps: Vec<SweepHandle>,
}

impl CredoNode {
    /// Open the store and build the engine from the given config.
    pub fn open(config: CredoConfig) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(TrustStore::open(&config.storage.data_dir)?);
        tracing::info!(path = %config.storage.data_dir.display(), "storage initialized");

        let validator = config.validator()?;
        if validator.key_count() == 0 {
            tracing::warn!("no trusted recovery keys configured, every proof will be refused");
        }

        let engine = TrustEngine::new(
            store,
            &config.engine(),
            config.providers.build()?,
            Arc::new(validator),
        )?;

        Ok(Self {
            config,
            engine,
            sweeps: Vec::new(),
        })
    }

    pub fn engine(&self) -> &TrustEngine {
        &self.engine
    }

    pub fn config(&self) -> &CredoConfig {
        &self.config
    }

    /// Store the configured rules. Rules that already exist are left as they
    /// are. Returns the number of rules added.
    pub async fn seed_rules(&self) -> Result<usize> {
        let mut added = 0;
        for rule in &self.config.rules {
            if self.engine.policy().add_rule(rule.clone()).await? == RuleChange::Added {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Seed rules and start the background sweeps.
    pub async fn start(&mut self) -> Result<()> {
        let added = self.seed_rules().await?;
        tracing::info!(
            configured = self.config.rules.len(),
            added,
            "policy rules seeded"
        );

        let schedule = self.config.schedule();
        self.sweeps = self.engine.spawn_sweeps(&schedule);
        tracing::info!(sweeps = self.sweeps.len(), "background sweeps started");
        Ok(())
    }

    /// Stop every sweep, letting running iterations finish.
    pub async fn shutdown(&mut self) {
        let handles = std::mem::take(&mut self.sweeps);
        let names: Vec<&'static str> = handles.iter().map(|h| h.name()).collect();
        let iterations = futures::future::join_all(handles.into_iter().map(|h| h.stop())).await;
        for (name, count) in names.into_iter().zip(iterations) {
            tracing::info!(sweep = name, iterations = count, "sweep shut down");
        }
    }
}
