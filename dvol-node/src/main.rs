//! dvol-node: convergence agent for one cluster node.
//!
//! Pulls the desired datasets and containers for this node from the
//! control service, converges the local backend towards them, and reports
//! what the node actually holds.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dvol_node::{AgentConfig, MemoryBackend, NodeAgent};

/// dvol Node Agent
#[derive(Parser, Debug)]
#[command(name = "dvol-node", version, about)]
struct Args {
    /// Address identifying this node (used as dataset primary)
    node_address: String,

    /// Control service endpoint (e.g., http://10.0.0.1:4523)
    control_endpoint: String,

    /// Maximum time between convergence passes, in milliseconds
    #[arg(long, default_value = "1000")]
    poll_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dvol_node=info,hyper=warn,reqwest=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting dvol-node agent: {}", args.node_address);
    info!("Control endpoint: {}", args.control_endpoint);

    let mut agent = NodeAgent::new(
        AgentConfig {
            node: args.node_address,
            control_endpoint: args.control_endpoint,
            poll_interval: Duration::from_millis(args.poll_interval_ms),
        },
        Arc::new(MemoryBackend::new()),
    );

    let mut sigterm = signal(SignalKind::terminate())?;
    agent
        .run(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
        })
        .await?;

    Ok(())
}
