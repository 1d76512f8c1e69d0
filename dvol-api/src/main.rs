use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dvol_api::rest::{AppState, create_router};
use dvol_api::{ApiAuditLogger, ControlStore, DataStore, StorageBackend, create_audit_logger};

#[derive(Parser)]
#[command(name = "dvol-api")]
#[command(about = "dvol control service - desired dataset configuration and observed cluster state")]
struct Args {
    /// Listen address for the REST API
    #[arg(short, long, default_value = "[::]:4523")]
    listen: String,

    /// Data directory for the persisted configuration
    #[arg(short, long, default_value = "/var/lib/dvol/control")]
    data_dir: PathBuf,

    /// Run in development mode (ephemeral configuration, no audit log)
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dvol_api=info".parse()?))
        .init();

    let args = Args::parse();

    let backend = if args.dev {
        StorageBackend::Memory
    } else {
        tokio::fs::create_dir_all(&args.data_dir).await?;
        StorageBackend::File {
            path: args.data_dir.join("configuration.json"),
        }
    };

    let store = Arc::new(ControlStore::open(backend).await?);

    let audit = if args.dev {
        Arc::new(ApiAuditLogger::new_noop())
    } else {
        create_audit_logger()
    };
    audit.start_event_listener(store.subscribe());

    let app_state = Arc::new(AppState { store });
    let router = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    info!("REST API listening on {}", args.listen);

    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = signal::ctrl_c() => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
        })
        .await?;

    info!("Shutdown complete");
    Ok(())
}
