//! Benchmark harness for the dvol control service.
//!
//! An [`Operation`] is bound to a [`ClusterClient`](dvol_client::ClusterClient)
//! and hands out [`Probe`]s. Every probe is one timed unit of work with a
//! cleanup step; [`run_probe`] pairs the two on every exit path.

pub mod benchmark;
pub mod error;
pub mod operations;
pub mod probe;

pub use benchmark::{Benchmark, BenchmarkReport, Sample};
pub use error::{BenchError, Result};
pub use operations::{NoOperation, Operation, OperationKind, ReadRequest};
pub use probe::{Probe, ProbeOutcome, ProbeRun, run_probe};
