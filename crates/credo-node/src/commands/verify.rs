//! `credo verify`: Verify the integrity of a DID's score history.

use clap::Args;

use credo_core::TrustError;

use super::parse_did;
use crate::node::CredoNode;

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// The DID whose ledger to verify.
    pub did: String,
}

pub fn run(args: &VerifyArgs, node: &CredoNode) -> anyhow::Result<()> {
    let did = parse_did(&args.did)?;

    match node.engine().ledger().verify_history(&did) {
        Ok(count) => {
            println!("✓ {} ledger entries verified for {}", count, did);
            Ok(())
        }
        Err(TrustError::TamperDetected { timestamp, .. }) => {
            println!("✗ Ledger entry at {} failed its integrity check", timestamp.to_rfc3339());
            anyhow::bail!("ledger for {} has been tampered with", did)
        }
        Err(e) => Err(e.into()),
    }
}
