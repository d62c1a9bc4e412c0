use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::TrustError;
use crate::types::SignalSource;

/// Tolerance when checking that the signal weights sum to one.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Per-source weights used by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalWeights {
    #[serde(default = "default_on_chain_weight")]
    pub on_chain: f64,
    #[serde(default = "default_federated_weight")]
    pub federated: f64,
    #[serde(default = "default_usage_weight")]
    pub usage: f64,
    #[serde(default = "default_social_weight")]
    pub social: f64,
}

impl SignalWeights {
    /// Weight assigned to a source.
    pub fn weight(&self, source: SignalSource) -> f64 {
        match source {
            SignalSource::OnChain => self.on_chain,
            SignalSource::Federated => self.federated,
            SignalSource::Usage => self.usage,
            SignalSource::Social => self.social,
        }
    }

    /// Weights must be non-negative and sum to 1.0.
    pub fn validate(&self) -> Result<(), TrustError> {
        let weights = SignalSource::ALL.map(|s| self.weight(s));
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(TrustError::Config(format!(
                "signal weights must be finite and non-negative: {:?}",
                self
            )));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(TrustError::Config(format!(
                "signal weights must sum to 1.0, got {}",
                sum
            )));
        }
        Ok(())
    }
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            on_chain: default_on_chain_weight(),
            federated: default_federated_weight(),
            usage: default_usage_weight(),
            social: default_social_weight(),
        }
    }
}

/// Bounded retry policy for transactions that hit a transient lock conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound on a single delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (0-based), without jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }

    pub fn validate(&self) -> Result<(), TrustError> {
        if self.max_attempts == 0 {
            return Err(TrustError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(TrustError::Config(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Configuration shared by the trust engine components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub weights: SignalWeights,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Upper bound on a single signal provider call.
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: SignalWeights::default(),
            retry: RetryPolicy::default(),
            provider_timeout_ms: default_provider_timeout_ms(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), TrustError> {
        self.weights.validate()?;
        self.retry.validate()?;
        if self.provider_timeout_ms == 0 {
            return Err(TrustError::Config("provider_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }
}

// Default value functions
fn default_on_chain_weight() -> f64 {
    0.30
}
fn default_federated_weight() -> f64 {
    0.20
}
fn default_usage_weight() -> f64 {
    0.15
}
fn default_social_weight() -> f64 {
    0.35
}
fn default_max_attempts() -> u32 {
    5
}
fn default_initial_backoff_ms() -> u64 {
    10
}
fn default_max_backoff_ms() -> u64 {
    500
}
fn default_provider_timeout_ms() -> u64 {
    5_000
}
