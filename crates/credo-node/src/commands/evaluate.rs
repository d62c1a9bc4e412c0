//! `credo evaluate`: Evaluate a DID against the policy rules.

use clap::Args;
use std::time::Duration;

use credo_engine::PolicyOutcome;
use credo_store::with_deadline;

use super::parse_did;
use crate::node::CredoNode;

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// The DID to evaluate.
    pub did: String,
}

pub async fn run(args: &EvaluateArgs, node: &CredoNode, timeout: Duration) -> anyhow::Result<()> {
    let did = parse_did(&args.did)?;
    let outcome = with_deadline(timeout, node.engine().policy().evaluate(&did)).await?;

    match &outcome {
        PolicyOutcome::NotFound => println!("{}: no trust score recorded", did),
        PolicyOutcome::Passed => println!("{}: passed all rules", did),
        PolicyOutcome::Alert(rule) => {
            println!("{}: ALERT (rule '{}', min {})", did, rule.name, rule.min_trust_score)
        }
        PolicyOutcome::Restricted(rule) => println!(
            "{}: RESTRICTED (rule '{}', min {})",
            did, rule.name, rule.min_trust_score
        ),
        PolicyOutcome::ReviewRequired(rule) => println!(
            "{}: REVIEW REQUIRED (rule '{}', min {})",
            did, rule.name, rule.min_trust_score
        ),
    }
    Ok(())
}
