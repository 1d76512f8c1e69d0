use std::sync::Arc;

use async_trait::async_trait;
use dvol_client::ClusterClient;

use super::Operation;
use crate::error::Result;
use crate::probe::{Probe, ProbeOutcome};

/// Does nothing; measures the harness overhead.
pub struct NoOperation {
    _control_service: Arc<dyn ClusterClient>,
}

impl NoOperation {
    pub fn new(control_service: Arc<dyn ClusterClient>) -> Self {
        Self {
            _control_service: control_service,
        }
    }
}

impl Operation for NoOperation {
    fn get_probe(&self) -> Box<dyn Probe> {
        Box::new(NoOpProbe)
    }
}

struct NoOpProbe;

#[async_trait]
impl Probe for NoOpProbe {
    async fn run(&mut self) -> Result<ProbeOutcome> {
        Ok(ProbeOutcome::Empty)
    }

    async fn cleanup(&mut self) -> Result<()> {
        Ok(())
    }
}
