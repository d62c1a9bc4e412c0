//! `credo history`: Print the score history of a DID.

use clap::Args;

use super::parse_did;
use crate::node::CredoNode;

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// The DID whose history to print.
    pub did: String,

    /// Print entries as JSON lines.
    #[arg(long)]
    pub json: bool,

    /// Show at most this many entries (oldest first).
    #[arg(short, long)]
    pub limit: Option<usize>,
}

pub fn run(args: &HistoryArgs, node: &CredoNode) -> anyhow::Result<()> {
    let did = parse_did(&args.did)?;
    let history = node.engine().ledger().history(&did);

    let mut shown = 0;
    for entry in history.iter()?.take(args.limit.unwrap_or(usize::MAX)) {
        let entry = entry?;
        if args.json {
            println!("{}", serde_json::to_string(&entry)?);
        } else {
            println!(
                "{}  {:.4}  {}",
                entry.timestamp.to_rfc3339(),
                entry.score,
                entry.integrity_hash
            );
        }
        shown += 1;
    }

    if shown == 0 && !args.json {
        println!("No history recorded for {}", did);
    }
    Ok(())
}
