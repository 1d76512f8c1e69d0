//! Shared state model for the dvol control service, its clients and node agents.
//!
//! Desired state lives in [`Configuration`] and is only changed by applying a
//! [`Command`]. Observed state lives in [`ObservedState`] and is only changed
//! by node reports (or by a simulator's synchronization step).

pub mod configuration;
pub mod error;
pub mod model;
pub mod state;

pub use configuration::{Command, Configuration, ContainerEntry, DatasetEntry, Response};
pub use error::{ConfigError, ErrorKind};
pub use model::{
    Container, ContainerState, Dataset, DatasetState, DatasetStatus, NodeInfo, NodeManifest,
    NodeStateReport, ObservedContainer, ObservedDataset,
};
pub use state::{NodeState, ObservedState};
