use std::time::Duration;

use async_trait::async_trait;
use dvol_types::DatasetState;
use tokio::time::Instant;
use tracing::warn;

use crate::error::Result;

/// What a probe's timed work produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Empty,
    DatasetStates(Vec<DatasetState>),
}

/// One timed, resource-scoped unit of work.
///
/// `run` is called at most once per probe. `cleanup` is called exactly
/// once afterwards, whether `run` succeeded, failed, or never got far
/// enough to acquire anything, and releases only what this probe created.
#[async_trait]
pub trait Probe: Send {
    async fn run(&mut self) -> Result<ProbeOutcome>;

    async fn cleanup(&mut self) -> Result<()>;
}

/// A completed probe with the duration of its `run` phase.
#[derive(Debug, Clone)]
pub struct ProbeRun {
    pub outcome: ProbeOutcome,
    pub elapsed: Duration,
}

/// Run a probe and always clean it up.
///
/// A `run` error is returned even if cleanup fails too; the cleanup error
/// is then only logged.
pub async fn run_probe(mut probe: Box<dyn Probe>) -> Result<ProbeRun> {
    let start = Instant::now();
    let result = probe.run().await;
    let elapsed = start.elapsed();
    let cleanup = probe.cleanup().await;

    match (result, cleanup) {
        (Ok(outcome), Ok(())) => Ok(ProbeRun { outcome, elapsed }),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(cleanup_err)) => {
            warn!("Probe cleanup failed after run error: {}", cleanup_err);
            Err(e)
        }
    }
}
