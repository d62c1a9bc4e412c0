//! `credo decay`: Show the current decay multiplier of a DID.

use clap::Args;

use super::parse_did;
use crate::node::CredoNode;

#[derive(Args, Debug)]
pub struct DecayArgs {
    /// The DID to inspect.
    pub did: String,
}

pub fn run(args: &DecayArgs, node: &CredoNode) -> anyhow::Result<()> {
    let did = parse_did(&args.did)?;
    let engine = node.engine();

    let rate = engine.recovery().decay_rate(&did)?;
    let oldest = engine.ledger().oldest(&did)?;
    let case = engine.recovery().case(&did)?;

    println!("DID:           {}", did);
    println!("Decay rate:    {}", rate);
    match oldest {
        Some(entry) => println!("First entry:   {}", entry.timestamp.to_rfc3339()),
        None => println!("First entry:   (none)"),
    }
    match case {
        Some(case) => println!("Recovery:      {} ({})", case.status, case.stage),
        None => println!("Recovery:      (no case)"),
    }
    Ok(())
}
