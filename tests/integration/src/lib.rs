//! Fixtures shared by the Credo integration tests.

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use std::path::PathBuf;
use std::sync::Arc;

use credo_core::{Did, EngineConfig, RetryPolicy, SignalSource};
use credo_engine::{
    Ed25519ProofValidator, SignalProvider, SignalProviders, StaticSignalProvider, TrustEngine,
};
use credo_store::TrustStore;

/// A full engine over a throwaway RocksDB directory, with one trusted
/// recovery key and adjustable signal providers.
pub struct TestEngine {
    pub dir: PathBuf,
    pub engine: TrustEngine,
    pub recovery_key: SigningKey,
    providers: Vec<Arc<StaticSignalProvider>>,
}

impl TestEngine {
    /// Every provider reports `default` unless overridden.
    pub fn new(default: f64) -> Self {
        Self::with_retry(default, RetryPolicy::default())
    }

    pub fn with_retry(default: f64, retry: RetryPolicy) -> Self {
        let dir = std::env::temp_dir().join(format!("credo-it-{}", rand::random::<u64>()));
        let store = Arc::new(TrustStore::open(&dir).expect("open store"));
        Self::on_store(dir, store, default, retry)
    }

    /// Build an engine over an already opened store.
    pub fn on_store(dir: PathBuf, store: Arc<TrustStore>, default: f64, retry: RetryPolicy) -> Self {
        let providers: Vec<Arc<StaticSignalProvider>> = SignalSource::ALL
            .iter()
            .map(|source| Arc::new(StaticSignalProvider::new(*source, Some(default))))
            .collect();
        let set = SignalProviders::new(
            providers
                .iter()
                .map(|p| p.clone() as Arc<dyn SignalProvider>)
                .collect(),
        )
        .expect("provider set");

        let recovery_key = SigningKey::generate(&mut OsRng);
        let validator = Ed25519ProofValidator::new(vec![recovery_key.verifying_key()]);
        let config = EngineConfig {
            retry,
            ..Default::default()
        };
        let engine =
            TrustEngine::new(store, &config, set, Arc::new(validator)).expect("engine");

        Self {
            dir,
            engine,
            recovery_key,
            providers,
        }
    }

    /// Make every provider report `score` for `did`.
    pub fn set_signals(&self, did: &Did, score: f64) {
        for provider in &self.providers {
            provider.set(did.clone(), score);
        }
    }

    /// A valid recovery proof for `did`.
    pub fn proof_for(&self, did: &Did) -> [u8; 64] {
        credo_engine::sign_recovery(&self.recovery_key, did)
    }
}

impl Drop for TestEngine {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.dir).ok();
    }
}

pub fn did(s: &str) -> Did {
    Did::parse(s).expect("valid DID")
}
