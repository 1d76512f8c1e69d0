//! Bounded polling for eventual convergence.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::client::ClusterClient;
use crate::error::{ClientError, Result};

const DATASET_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Poll `check` until it yields `true`.
///
/// Errors from `check` abort the wait. Fails with
/// [`ClientError::ConvergenceTimeout`] once `timeout` has elapsed, including
/// while a `check` call is still in flight.
pub async fn wait_for<F, Fut>(
    timeout: Duration,
    poll_interval: Duration,
    mut check: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = Instant::now();
    let deadline = start + timeout;
    loop {
        match tokio::time::timeout_at(deadline, check()).await {
            Ok(Ok(true)) => return Ok(()),
            Ok(Ok(false)) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(ClientError::ConvergenceTimeout {
                    waited: start.elapsed(),
                });
            }
        }
        let waited = start.elapsed();
        if waited >= timeout {
            return Err(ClientError::ConvergenceTimeout { waited });
        }
        tokio::time::sleep(poll_interval.min(timeout - waited)).await;
    }
}

/// Wait until the observed state shows `dataset_id` on `primary`, and only there.
pub async fn wait_for_dataset_state<C>(
    client: &C,
    dataset_id: Uuid,
    primary: &str,
    timeout: Duration,
) -> Result<()>
where
    C: ClusterClient + ?Sized,
{
    wait_for(timeout, DATASET_POLL_INTERVAL, move || async move {
        let states = client.list_dataset_state().await?;
        let holders: Vec<&str> = states
            .iter()
            .filter(|s| s.dataset_id == dataset_id)
            .map(|s| s.primary.as_str())
            .collect();
        debug!("Dataset {} held by {:?}", dataset_id, holders);
        Ok(holders == [primary])
    })
    .await
}
