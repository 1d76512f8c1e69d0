use std::sync::Arc;

use async_trait::async_trait;
use dvol_client::ClusterClient;

use super::Operation;
use crate::error::Result;
use crate::probe::{Probe, ProbeOutcome};

/// Reads the observed dataset state once per probe.
pub struct ReadRequest {
    control_service: Arc<dyn ClusterClient>,
}

impl ReadRequest {
    pub fn new(control_service: Arc<dyn ClusterClient>) -> Self {
        Self { control_service }
    }
}

impl Operation for ReadRequest {
    fn get_probe(&self) -> Box<dyn Probe> {
        Box::new(ReadRequestProbe {
            control_service: self.control_service.clone(),
        })
    }
}

struct ReadRequestProbe {
    control_service: Arc<dyn ClusterClient>,
}

#[async_trait]
impl Probe for ReadRequestProbe {
    async fn run(&mut self) -> Result<ProbeOutcome> {
        let states = self.control_service.list_dataset_state().await?;
        Ok(ProbeOutcome::DatasetStates(states))
    }

    // Read-only: nothing to release.
    async fn cleanup(&mut self) -> Result<()> {
        Ok(())
    }
}
