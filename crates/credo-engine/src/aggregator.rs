//! Weighted aggregation of trust signals.
//!
//! The four providers are queried concurrently. A provider that fails, times
//! out, or returns a negative or NaN reading contributes `0.0`; readings
//! above `1.0` are capped. The weighted sum is persisted together with a
//! ledger entry in one transaction.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use credo_core::{Did, EngineConfig, ScoreRecord, SignalSource, SignalWeights, TrustError};
use credo_store::PersistenceCoordinator;

use crate::ledger::Ledger;
use crate::provider::{ProviderError, Signal, SignalProviders};
use crate::sweep::{Sweep, SweepReport};

/// Sanitized reading of every source for one identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SignalBreakdown {
    pub on_chain: f64,
    pub federated: f64,
    pub usage: f64,
    pub social: f64,
}

impl SignalBreakdown {
    pub fn get(&self, source: SignalSource) -> f64 {
        match source {
            SignalSource::OnChain => self.on_chain,
            SignalSource::Federated => self.federated,
            SignalSource::Usage => self.usage,
            SignalSource::Social => self.social,
        }
    }

    /// Weighted sum, clamped into `[0, 1]`.
    pub fn weighted(&self, weights: &SignalWeights) -> f64 {
        SignalSource::ALL
            .iter()
            .map(|source| weights.weight(*source) * self.get(*source))
            .sum::<f64>()
            .clamp(0.0, 1.0)
    }
}

/// Validate a provider reading: NaN and negative values are refused, values
/// above one are capped.
pub fn sanitize(source: SignalSource, signal: Signal) -> Result<f64, ProviderError> {
    if signal.score.is_nan() || signal.score < 0.0 {
        return Err(ProviderError::InvalidSignal {
            origin: source,
            value: signal.score,
        });
    }
    Ok(signal.score.min(1.0))
}

/// Computes and records trust scores.
pub struct Aggregator {
    providers: SignalProviders,
    weights: SignalWeights,
    provider_timeout: Duration,
    coordinator: Arc<PersistenceCoordinator>,
    ledger: Arc<Ledger>,
}

impl Aggregator {
    /// Fails with [`TrustError::Config`] if the configured weights are
    /// negative or do not sum to one.
    pub fn new(
        providers: SignalProviders,
        config: &EngineConfig,
        coordinator: Arc<PersistenceCoordinator>,
        ledger: Arc<Ledger>,
    ) -> Result<Self, TrustError> {
        config.weights.validate()?;
        Ok(Self {
            providers,
            weights: config.weights,
            provider_timeout: config.provider_timeout(),
            coordinator,
            ledger,
        })
    }

    /// Query every provider concurrently and return the sanitized readings.
    pub async fn collect_signals(&self, did: &Did) -> SignalBreakdown {
        let (on_chain, federated, usage, social) = tokio::join!(
            self.fetch(SignalSource::OnChain, did),
            self.fetch(SignalSource::Federated, did),
            self.fetch(SignalSource::Usage, did),
            self.fetch(SignalSource::Social, did),
        );
        SignalBreakdown {
            on_chain,
            federated,
            usage,
            social,
        }
    }

    async fn fetch(&self, source: SignalSource, did: &Did) -> f64 {
        let result = match self.providers.get(source) {
            Some(provider) => {
                match tokio::time::timeout(self.provider_timeout, provider.fetch(did)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout {
                        origin: source,
                        after: self.provider_timeout,
                    }),
                }
            }
            None => Err(ProviderError::Unavailable {
                origin: source,
                reason: "no provider registered".into(),
            }),
        };

        match result.and_then(|signal| sanitize(source, signal)) {
            Ok(score) => score,
            Err(e) => {
                tracing::warn!(did = %did, source = %source, error = %e, "signal ignored");
                0.0
            }
        }
    }

    /// Compute the identifier's score, store it and record it in the ledger.
    ///
    /// A new identifier starts unflagged; an existing one keeps its flag.
    pub async fn aggregate(&self, did: &Did) -> Result<f64, TrustError> {
        let signals = self.collect_signals(did).await;
        let score = signals.weighted(&self.weights);

        let entry = self
            .coordinator
            .with_transaction("aggregate", |txn| {
                let record = match txn.score_for_update(did)? {
                    Some(mut record) => {
                        record.score = score;
                        record
                    }
                    None => ScoreRecord::new(did.clone(), score),
                };
                txn.put_score(&record)?;
                self.ledger.append_in(txn, did, score, Utc::now())
            })
            .await?;

        tracing::info!(
            did = %did,
            score,
            on_chain = signals.on_chain,
            federated = signals.federated,
            usage = signals.usage,
            social = signals.social,
            hash = %entry.integrity_hash,
            "trust score aggregated"
        );
        Ok(score)
    }

    /// Re-aggregate every known identifier.
    pub async fn rescore_all(&self) -> Result<SweepReport, TrustError> {
        let dids = self.coordinator.store().dids()?;
        let mut report = SweepReport::default();
        for did in dids {
            report.examined += 1;
            match self.aggregate(&did).await {
                Ok(_) => report.acted += 1,
                Err(e) => {
                    tracing::error!(did = %did, error = %e, "re-scoring failed");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}

#[async_trait]
impl Sweep for Aggregator {
    fn name(&self) -> &'static str {
        "rescore"
    }

    async fn run_once(&self) -> Result<SweepReport, TrustError> {
        self.rescore_all().await
    }
}
