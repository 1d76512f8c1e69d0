//! dvol-node: convergence agent running on every cluster node.
//!
//! The agent pulls the manifest for its node from the control service,
//! reconciles local datasets and containers against it through a
//! [`LocalBackend`], and pushes a full snapshot of what the node holds.

pub mod agent;
pub mod backend;
pub mod control;
pub mod error;
pub mod reconciler;

pub use agent::{AgentConfig, NodeAgent};
pub use backend::{LocalBackend, LocalContainer, LocalDataset, MemoryBackend};
pub use control::ControlClient;
pub use error::{AgentError, Result};
