//! Periodic background sweeps.
//!
//! A sweep runs on a fixed interval in its own tokio task. Stopping is
//! cooperative: the stop signal is only observed between iterations, so an
//! iteration that has started always runs to completion.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use credo_core::TrustError;

/// Summary of one sweep iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Identifiers looked at.
    pub examined: usize,
    /// Identifiers the sweep acted on (rule fired, score repaired, ...).
    pub acted: usize,
    /// Identifiers whose processing failed.
    pub failed: usize,
}

/// A unit of periodic work.
#[async_trait]
pub trait Sweep: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Process everything once.
    async fn run_once(&self) -> Result<SweepReport, TrustError>;
}

/// Handle to a running sweep task.
pub struct SweepHandle {
    name: &'static str,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<u64>,
}

impl SweepHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Signal the sweep to stop and wait for the current iteration, if any,
    /// to finish. Returns the number of iterations that ran.
    pub async fn stop(self) -> u64 {
        if self.stop_tx.send(true).is_err() {
            tracing::debug!(sweep = self.name, "sweep task already exited");
        }
        match self.task.await {
            Ok(iterations) => iterations,
            Err(e) => {
                tracing::error!(sweep = self.name, error = %e, "sweep task failed");
                0
            }
        }
    }
}

/// Start running `sweep` every `period`. The first iteration starts
/// immediately.
pub fn spawn_sweep(sweep: Arc<dyn Sweep>, period: Duration) -> SweepHandle {
    let name = sweep.name();
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut iterations: u64 = 0;

        tracing::info!(sweep = name, period_secs = period.as_secs_f64(), "sweep started");

        loop {
            tokio::select! {
                biased;
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if *stop_rx.borrow() {
                        break;
                    }
                    iterations += 1;
                    match sweep.run_once().await {
                        Ok(report) => tracing::info!(
                            sweep = name,
                            iteration = iterations,
                            examined = report.examined,
                            acted = report.acted,
                            failed = report.failed,
                            "sweep iteration finished"
                        ),
                        Err(e) => tracing::error!(
                            sweep = name,
                            iteration = iterations,
                            error = %e,
                            "sweep iteration failed"
                        ),
                    }
                }
            }
        }

        tracing::info!(sweep = name, iterations, "sweep stopped");
        iterations
    });

    SweepHandle { name, stop_tx, task }
}
