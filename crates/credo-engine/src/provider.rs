//! Trust signal providers.
//!
//! Each of the four signal sources is reached through a [`SignalProvider`].
//! Providers return a fixed-shape [`Signal`]; anything they cannot produce is
//! a [`ProviderError`], which the aggregator absorbs.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use credo_core::{Did, SignalSource, TrustError};

/// A single signal reading. Valid readings lie in `[0.0, 1.0]`; larger values
/// are capped by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub score: f64,
}

impl Signal {
    pub fn new(score: f64) -> Self {
        Self { score }
    }
}

/// Errors a signal provider can report.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{origin} provider has no data for {did}")]
    NoData { origin: SignalSource, did: String },

    #[error("{origin} provider unavailable: {reason}")]
    Unavailable { origin: SignalSource, reason: String },

    #[error("{origin} provider returned invalid signal {value}")]
    InvalidSignal { origin: SignalSource, value: f64 },

    #[error("{origin} provider timed out after {after:?}")]
    Timeout { origin: SignalSource, after: Duration },
}

/// Source of one kind of trust signal.
#[async_trait]
pub trait SignalProvider: Send + Sync {
    /// Which signal this provider reports.
    fn source(&self) -> SignalSource;

    /// Fetch the current signal for an identifier.
    async fn fetch(&self, did: &Did) -> Result<Signal, ProviderError>;
}

/// Provider backed by a fixed default with per-identifier overrides.
///
/// Without a default, identifiers that have no override report
/// [`ProviderError::NoData`].
pub struct StaticSignalProvider {
    source: SignalSource,
    default: Option<f64>,
    overrides: DashMap<Did, f64>,
}

impl StaticSignalProvider {
    pub fn new(source: SignalSource, default: Option<f64>) -> Self {
        Self {
            source,
            default,
            overrides: DashMap::new(),
        }
    }

    /// Set the reading returned for one identifier.
    pub fn set(&self, did: Did, score: f64) {
        self.overrides.insert(did, score);
    }
}

#[async_trait]
impl SignalProvider for StaticSignalProvider {
    fn source(&self) -> SignalSource {
        self.source
    }

    async fn fetch(&self, did: &Did) -> Result<Signal, ProviderError> {
        self.overrides
            .get(did)
            .map(|entry| *entry.value())
            .or(self.default)
            .map(Signal::new)
            .ok_or_else(|| ProviderError::NoData {
                origin: self.source,
                did: did.to_string(),
            })
    }
}

/// The full set of providers, exactly one per [`SignalSource`].
#[derive(Clone)]
pub struct SignalProviders {
    providers: HashMap<SignalSource, Arc<dyn SignalProvider>>,
}

impl SignalProviders {
    /// Build the set from a list of providers. Every source must be covered
    /// exactly once.
    pub fn new(list: Vec<Arc<dyn SignalProvider>>) -> Result<Self, TrustError> {
        let mut providers: HashMap<SignalSource, Arc<dyn SignalProvider>> = HashMap::new();
        for provider in list {
            let source = provider.source();
            if providers.insert(source, provider).is_some() {
                return Err(TrustError::Config(format!(
                    "more than one provider registered for {}",
                    source
                )));
            }
        }
        if let Some(missing) = SignalSource::ALL
            .iter()
            .find(|source| !providers.contains_key(*source))
        {
            return Err(TrustError::Config(format!("no provider registered for {}", missing)));
        }
        Ok(Self { providers })
    }

    /// Four static providers with the given default readings.
    pub fn fixed(on_chain: f64, federated: f64, usage: f64, social: f64) -> Self {
        let provider = |source, score| -> Arc<dyn SignalProvider> {
            Arc::new(StaticSignalProvider::new(source, Some(score)))
        };
        let providers = HashMap::from([
            (SignalSource::OnChain, provider(SignalSource::OnChain, on_chain)),
            (SignalSource::Federated, provider(SignalSource::Federated, federated)),
            (SignalSource::Usage, provider(SignalSource::Usage, usage)),
            (SignalSource::Social, provider(SignalSource::Social, social)),
        ]);
        Self { providers }
    }

    /// The provider registered for a source.
    pub fn get(&self, source: SignalSource) -> Option<&Arc<dyn SignalProvider>> {
        self.providers.get(&source)
    }
}
