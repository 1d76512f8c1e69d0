//! Sampling driver and report.

use std::sync::Arc;
use std::time::Duration;

use dvol_client::ClusterClient;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{BenchError, Result};
use crate::operations::OperationKind;
use crate::probe::run_probe;

/// One probe execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    pub elapsed_ms: f64,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BenchmarkReport {
    pub operation: String,
    /// RFC 3339 start time.
    pub started_at: String,
    pub samples: Vec<Sample>,
    /// Statistics over successful samples; absent if none succeeded.
    pub min_ms: Option<f64>,
    pub mean_ms: Option<f64>,
    pub max_ms: Option<f64>,
}

impl BenchmarkReport {
    pub fn failures(&self) -> usize {
        self.samples.iter().filter(|s| !s.ok).count()
    }
}

/// Runs `samples` probes of one operation, sequentially.
pub struct Benchmark {
    pub operation: OperationKind,
    pub samples: usize,
    control_service: Arc<dyn ClusterClient>,
}

impl Benchmark {
    pub fn new(
        operation: OperationKind,
        samples: usize,
        control_service: Arc<dyn ClusterClient>,
    ) -> Self {
        Self {
            operation,
            samples,
            control_service,
        }
    }

    pub async fn run(&self) -> Result<BenchmarkReport> {
        if self.samples == 0 {
            return Err(BenchError::NoSamples);
        }

        let started_at = chrono::Utc::now().to_rfc3339();
        let operation = self.operation.build(self.control_service.clone());
        let mut samples = Vec::with_capacity(self.samples);

        for i in 0..self.samples {
            let start = Instant::now();
            let sample = match run_probe(operation.get_probe()).await {
                Ok(run) => Sample {
                    elapsed_ms: millis(run.elapsed),
                    ok: true,
                    error: None,
                },
                Err(e) => {
                    warn!("Sample {} of {} failed: {}", i + 1, self.operation, e);
                    Sample {
                        elapsed_ms: millis(start.elapsed()),
                        ok: false,
                        error: Some(e.to_string()),
                    }
                }
            };
            debug!("Sample {}: {:.3} ms", i + 1, sample.elapsed_ms);
            samples.push(sample);
        }

        let ok: Vec<f64> = samples
            .iter()
            .filter(|s| s.ok)
            .map(|s| s.elapsed_ms)
            .collect();
        let (min_ms, mean_ms, max_ms) = if ok.is_empty() {
            (None, None, None)
        } else {
            (
                ok.iter().copied().reduce(f64::min),
                Some(ok.iter().sum::<f64>() / ok.len() as f64),
                ok.iter().copied().reduce(f64::max),
            )
        };

        Ok(BenchmarkReport {
            operation: self.operation.to_string(),
            started_at,
            samples,
            min_ms,
            mean_ms,
            max_ms,
        })
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
