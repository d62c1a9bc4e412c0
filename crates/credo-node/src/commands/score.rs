//! `credo score`: Aggregate and store the trust score of a DID.

use clap::Args;
use std::time::Duration;

use credo_store::with_deadline;

use super::parse_did;
use crate::node::CredoNode;

#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// The DID to score.
    pub did: String,
}

pub async fn run(args: &ScoreArgs, node: &CredoNode, timeout: Duration) -> anyhow::Result<()> {
    let did = parse_did(&args.did)?;
    let engine = node.engine();

    let score = with_deadline(timeout, engine.aggregator().aggregate(&did)).await?;
    let flagged = engine
        .store()
        .score(&did)?
        .map(|record| record.flagged)
        .unwrap_or(false);

    println!("DID:      {}", did);
    println!("Score:    {:.4}", score);
    println!("Flagged:  {}", if flagged { "yes" } else { "no" });
    Ok(())
}
