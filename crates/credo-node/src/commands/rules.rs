//! `credo rules`: List, add, and remove policy rules.

use clap::{Args, Subcommand};
use std::time::Duration;

use credo_core::{PolicyAction, PolicyRule};
use credo_engine::RuleChange;
use credo_store::with_deadline;

use crate::node::CredoNode;

#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// List rules in evaluation order.
    List,
    /// Add a rule.
    Add {
        /// Unique rule name.
        #[arg(short, long)]
        name: String,
        /// Scores below this threshold trigger the rule.
        #[arg(short, long)]
        min_score: f64,
        /// Action to take: alert, restrict, or review.
        #[arg(short, long)]
        action: PolicyAction,
    },
    /// Remove a rule by name.
    Remove {
        /// Name of the rule to remove.
        name: String,
    },
}

pub async fn run(args: &RulesArgs, node: &CredoNode, timeout: Duration) -> anyhow::Result<()> {
    let policy = node.engine().policy();

    match &args.command {
        RulesCommand::List => {
            let rules = policy.rules()?;
            if rules.is_empty() {
                println!("No policy rules configured.");
                return Ok(());
            }
            println!("{:<24} {:>10}  ACTION", "NAME", "MIN SCORE");
            for rule in rules.iter() {
                println!("{:<24} {:>10.4}  {}", rule.name, rule.min_trust_score, rule.action);
            }
        }
        RulesCommand::Add {
            name,
            min_score,
            action,
        } => {
            let rule = PolicyRule::new(name.clone(), *min_score, *action);
            match with_deadline(timeout, policy.add_rule(rule)).await? {
                RuleChange::Added => println!("Added rule '{}'", name),
                RuleChange::DuplicateRule => {
                    println!("Rule '{}' already exists; nothing changed", name)
                }
            }
        }
        RulesCommand::Remove { name } => {
            if with_deadline(timeout, policy.remove_rule(name)).await? {
                println!("Removed rule '{}'", name);
            } else {
                println!("No rule named '{}'", name);
            }
        }
    }
    Ok(())
}
