//! Credo node: trust state engine for decentralized identifiers.
//!
//! `credo run` keeps the background sweeps going until Ctrl-C; the other
//! subcommands perform a single operation against the local store and exit.

mod commands;
mod config;
mod node;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use config::CredoConfig;
use node::CredoNode;

/// Credo: trust state engine for decentralized identifiers.
#[derive(Parser, Debug)]
#[command(name = "credo", version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, global = true, default_value = "credo.toml")]
    config: PathBuf,

    /// Override the data directory.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Upper bound on a single on-demand operation, in milliseconds.
    #[arg(long, global = true, default_value_t = 30_000)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file.
    Init(commands::init::InitArgs),
    /// Run the background sweeps until interrupted.
    Run,
    /// Aggregate and store the trust score of a DID.
    Score(commands::score::ScoreArgs),
    /// Evaluate a DID against the policy rules.
    Evaluate(commands::evaluate::EvaluateArgs),
    /// Manage policy rules.
    Rules(commands::rules::RulesArgs),
    /// Open a recovery case or submit a recovery proof.
    Recover(commands::recover::RecoverArgs),
    /// Print the score history of a DID.
    History(commands::history::HistoryArgs),
    /// Verify the integrity of a DID's score history.
    Verify(commands::verify::VerifyArgs),
    /// Show the current decay multiplier of a DID.
    Decay(commands::decay::DecayArgs),
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = CredoConfig::load(&cli.config)?;
    if let Some(ref data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir.clone();
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }

    init_tracing(&config.logging.level, &config.logging.format);

    let timeout = Duration::from_millis(cli.timeout_ms);
    match &cli.command {
        Commands::Init(args) => commands::init::run(args, &cli.config, &config),
        Commands::Run => commands::run::run(config).await,
        Commands::Score(args) => {
            commands::score::run(args, &CredoNode::open(config)?, timeout).await
        }
        Commands::Evaluate(args) => {
            commands::evaluate::run(args, &CredoNode::open(config)?, timeout).await
        }
        Commands::Rules(args) => {
            commands::rules::run(args, &CredoNode::open(config)?, timeout).await
        }
        Commands::Recover(args) => {
            commands::recover::run(args, &CredoNode::open(config)?, timeout).await
        }
        Commands::History(args) => commands::history::run(args, &CredoNode::open(config)?),
        Commands::Verify(args) => commands::verify::run(args, &CredoNode::open(config)?),
        Commands::Decay(args) => commands::decay::run(args, &CredoNode::open(config)?),
    }
}
