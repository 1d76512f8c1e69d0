//! dvol-bench: measure control service operation latency.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use dvol_bench::{Benchmark, OperationKind};
use dvol_client::HttpClient;

/// dvol Benchmark
#[derive(Parser, Debug)]
#[command(name = "dvol-bench", version, about)]
struct Args {
    /// Control service endpoint
    #[arg(long, default_value = "http://[::1]:4523")]
    control: String,

    /// Operation to measure (no-op, read-request)
    #[arg(long, default_value = "read-request")]
    operation: OperationKind,

    /// Number of probes to run
    #[arg(long, default_value = "10")]
    samples: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the report
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dvol_bench=info".parse()?),
        )
        .init();

    let args = Args::parse();
    info!(
        "Running {} x {} against {}",
        args.samples, args.operation, args.control
    );

    let client = Arc::new(HttpClient::new(&args.control));
    let report = Benchmark::new(args.operation, args.samples, client)
        .run()
        .await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
