//! Registered benchmark operations.

mod no_op;
mod read_request;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use dvol_client::ClusterClient;

use crate::error::BenchError;
use crate::probe::Probe;

pub use no_op::NoOperation;
pub use read_request::ReadRequest;

/// Factory for probes bound to one control service client.
pub trait Operation: Send + Sync {
    fn get_probe(&self) -> Box<dyn Probe>;
}

/// Every operation the harness knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    NoOp,
    ReadRequest,
}

impl OperationKind {
    pub const ALL: [OperationKind; 2] = [OperationKind::NoOp, OperationKind::ReadRequest];

    pub fn name(self) -> &'static str {
        match self {
            OperationKind::NoOp => "no-op",
            OperationKind::ReadRequest => "read-request",
        }
    }

    pub fn build(self, control_service: Arc<dyn ClusterClient>) -> Box<dyn Operation> {
        match self {
            OperationKind::NoOp => Box::new(NoOperation::new(control_service)),
            OperationKind::ReadRequest => Box::new(ReadRequest::new(control_service)),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OperationKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| BenchError::UnknownOperation(s.to_string()))
    }
}
