//! `credo init`: Write a default configuration file.

use clap::Args;
use std::path::Path;

use crate::config::CredoConfig;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration file.
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &InitArgs, path: &Path, config: &CredoConfig) -> anyhow::Result<()> {
    if path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }
    config.save(path)?;
    tracing::info!(path = %path.display(), "wrote config");
    println!("Wrote configuration to {}", path.display());
    println!("  Data directory: {}", config.storage.data_dir.display());
    Ok(())
}
