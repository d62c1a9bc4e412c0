//! Node configuration loading and management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use credo_core::{EngineConfig, PolicyRule, RetryPolicy, SignalSource, SignalWeights};
use credo_engine::{
    Ed25519ProofValidator, SignalProvider, SignalProviders, StaticSignalProvider, SweepSchedule,
};

/// Full configuration for the Credo node.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CredoConfig {
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-source aggregation weights.
    #[serde(default)]
    pub weights: SignalWeights,

    /// Transaction retry policy.
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Signal provider settings.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Background sweep intervals.
    #[serde(default)]
    pub sweeps: SweepsConfig,

    /// Recovery proof settings.
    #[serde(default)]
    pub recovery: RecoveryConfig,

    /// Policy rules seeded at startup.
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the data directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Upper bound on a single provider call.
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,
    /// Default on-chain reading.
    #[serde(default = "default_on_chain_signal")]
    pub on_chain: f64,
    /// Default federated reading.
    #[serde(default = "default_federated_signal")]
    pub federated: f64,
    /// Default usage reading.
    #[serde(default = "default_usage_signal")]
    pub usage: f64,
    /// Default social reading.
    #[serde(default = "default_social_signal")]
    pub social: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepsConfig {
    /// Seconds between policy enforcement sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub policy_interval_secs: u64,
    /// Seconds between recovery repair sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub repair_interval_secs: u64,
    /// Seconds between full re-scoring sweeps. Disabled when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rescore_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RecoveryConfig {
    /// Hex-encoded Ed25519 public keys whose signatures are accepted as
    /// recovery proofs.
    #[serde(default)]
    pub trusted_keys: Vec<String>,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_provider_timeout_ms() -> u64 {
    5_000
}
fn default_on_chain_signal() -> f64 {
    0.8
}
fn default_federated_signal() -> f64 {
    0.7
}
fn default_usage_signal() -> f64 {
    0.6
}
fn default_social_signal() -> f64 {
    0.5
}
fn default_sweep_interval_secs() -> u64 {
    86_400
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_provider_timeout_ms(),
            on_chain: default_on_chain_signal(),
            federated: default_federated_signal(),
            usage: default_usage_signal(),
            social: default_social_signal(),
        }
    }
}

impl Default for SweepsConfig {
    fn default() -> Self {
        Self {
            policy_interval_secs: default_sweep_interval_secs(),
            repair_interval_secs: default_sweep_interval_secs(),
            rescore_interval_secs: None,
        }
    }
}

impl ProvidersConfig {
    /// One static provider per source, seeded with the configured readings.
    pub fn build(&self) -> anyhow::Result<SignalProviders> {
        let providers = SignalSource::ALL
            .iter()
            .map(|source| {
                let reading = match source {
                    SignalSource::OnChain => self.on_chain,
                    SignalSource::Federated => self.federated,
                    SignalSource::Usage => self.usage,
                    SignalSource::Social => self.social,
                };
                Arc::new(StaticSignalProvider::new(*source, Some(reading))) as Arc<dyn SignalProvider>
            })
            .collect();
        Ok(SignalProviders::new(providers)?)
    }
}

impl CredoConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: CredoConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Settings shared by the engine components.
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            weights: self.weights,
            retry: self.retry,
            provider_timeout_ms: self.providers.timeout_ms,
        }
    }

    pub fn schedule(&self) -> SweepSchedule {
        SweepSchedule {
            policy: Duration::from_secs(self.sweeps.policy_interval_secs),
            repair: Duration::from_secs(self.sweeps.repair_interval_secs),
            rescore: self.sweeps.rescore_interval_secs.map(Duration::from_secs),
        }
    }

    pub fn validator(&self) -> anyhow::Result<Ed25519ProofValidator> {
        Ok(Ed25519ProofValidator::from_hex_keys(&self.recovery.trusted_keys)?)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.engine().validate()?;
        if self.sweeps.policy_interval_secs == 0 || self.sweeps.repair_interval_secs == 0 {
            anyhow::bail!("sweep intervals must be positive");
        }
        if self.sweeps.rescore_interval_secs == Some(0) {
            anyhow::bail!("sweeps.rescore_interval_secs must be positive when set");
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("logging.format must be 'text' or 'json', got '{}'", self.logging.format);
        }
        for rule in &self.rules {
            rule.validate()?;
        }
        Ok(())
    }
}
