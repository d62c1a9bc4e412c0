//! Recovery proof validation.

use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};

use credo_core::{Did, TrustError};

/// Decides whether a submitted recovery proof is acceptable.
#[async_trait]
pub trait ProofValidator: Send + Sync {
    async fn validate(&self, did: &Did, proof: &[u8]) -> bool;
}

/// The message a recovery authority signs for an identifier.
pub fn recovery_message(did: &Did) -> String {
    format!("credo-recovery:{}", did)
}

/// Produce the proof a trusted recovery key would issue for `did`.
pub fn sign_recovery(key: &SigningKey, did: &Did) -> [u8; 64] {
    key.sign(recovery_message(did).as_bytes()).to_bytes()
}

/// Accepts a 64-byte Ed25519 signature over [`recovery_message`] made by
/// any of the trusted keys.
pub struct Ed25519ProofValidator {
    trusted: Vec<VerifyingKey>,
}

impl Ed25519ProofValidator {
    pub fn new(trusted: Vec<VerifyingKey>) -> Self {
        Self { trusted }
    }

    /// Build from hex-encoded 32-byte public keys.
    pub fn from_hex_keys(keys: &[String]) -> Result<Self, TrustError> {
        let trusted = keys
            .iter()
            .map(|encoded| {
                let bytes = hex::decode(encoded).map_err(|e| {
                    TrustError::Config(format!("recovery key '{}' is not hex: {}", encoded, e))
                })?;
                let bytes: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
                    TrustError::Config(format!(
                        "recovery key '{}' must be 32 bytes, got {}",
                        encoded,
                        bytes.len()
                    ))
                })?;
                VerifyingKey::from_bytes(&bytes).map_err(|e| {
                    TrustError::Config(format!("recovery key '{}' is invalid: {}", encoded, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(trusted))
    }

    pub fn key_count(&self) -> usize {
        self.trusted.len()
    }
}

#[async_trait]
impl ProofValidator for Ed25519ProofValidator {
    async fn validate(&self, did: &Did, proof: &[u8]) -> bool {
        let Ok(bytes) = <[u8; 64]>::try_from(proof) else {
            tracing::debug!(did = %did, len = proof.len(), "recovery proof has wrong length");
            return false;
        };
        let signature = Signature::from_bytes(&bytes);
        let message = recovery_message(did);
        self.trusted
            .iter()
            .any(|key| key.verify_strict(message.as_bytes(), &signature).is_ok())
    }
}
