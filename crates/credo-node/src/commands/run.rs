//! `credo run`: Keep the background sweeps running until Ctrl-C.

use crate::config::CredoConfig;
use crate::node::CredoNode;

pub async fn run(config: CredoConfig) -> anyhow::Result<()> {
    tracing::info!("Credo node v{}", env!("CARGO_PKG_VERSION"));

    let mut node = CredoNode::open(config)?;
    node.start().await?;

    let sweeps = &node.config().sweeps;
    tracing::info!(
        policy_interval_secs = sweeps.policy_interval_secs,
        repair_interval_secs = sweeps.repair_interval_secs,
        rescore_interval_secs = ?sweeps.rescore_interval_secs,
        "node running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("received shutdown signal");

    node.shutdown().await;
    tracing::info!("Credo node exited cleanly");
    Ok(())
}
