//! `credo recover`: Open a recovery case or submit a recovery proof.

use clap::{Args, Subcommand};
use std::time::Duration;

use credo_engine::{InitiateOutcome, ProofOutcome};
use credo_store::with_deadline;

use super::parse_did;
use crate::node::CredoNode;

#[derive(Args, Debug)]
pub struct RecoverArgs {
    #[command(subcommand)]
    pub command: RecoverCommand,
}

#[derive(Subcommand, Debug)]
pub enum RecoverCommand {
    /// Open a recovery case for a flagged DID.
    Initiate {
        /// The flagged DID.
        did: String,
    },
    /// Submit a recovery proof for a DID with a pending case.
    Submit {
        /// The DID under recovery.
        did: String,
        /// Hex-encoded proof (a 64-byte Ed25519 signature).
        #[arg(short, long)]
        proof: String,
    },
}

pub async fn run(args: &RecoverArgs, node: &CredoNode, timeout: Duration) -> anyhow::Result<()> {
    let recovery = node.engine().recovery();

    match &args.command {
        RecoverCommand::Initiate { did } => {
            let did = parse_did(did)?;
            match with_deadline(timeout, recovery.initiate(&did)).await? {
                InitiateOutcome::Initiated(case) => {
                    println!("Recovery case opened for {}", did);
                    println!("  Status:       {}", case.status);
                    println!("  Stage:        {}", case.stage);
                    println!("  Last attempt: {}", case.last_attempt.to_rfc3339());
                }
                InitiateOutcome::NotFlagged => {
                    println!("{} is not flagged; no recovery needed", did)
                }
            }
        }
        RecoverCommand::Submit { did, proof } => {
            let did = parse_did(did)?;
            let proof = hex::decode(proof.trim())
                .map_err(|e| anyhow::anyhow!("proof is not valid hex: {}", e))?;
            match with_deadline(timeout, recovery.submit_proof(&did, &proof)).await? {
                ProofOutcome::Verified(_) => println!("Proof accepted: {} is no longer flagged", did),
                ProofOutcome::Rejected(_) => {
                    println!("Proof rejected: {} remains flagged", did);
                    println!("Open a new case with: credo recover initiate {}", did);
                }
                ProofOutcome::NoActiveCase => println!("{} has no pending recovery case", did),
            }
        }
    }
    Ok(())
}
