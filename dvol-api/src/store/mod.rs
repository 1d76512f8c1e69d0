//! Control service storage: the authoritative desired configuration plus the
//! observed state aggregated from node agents.

mod control_store;
mod error;
mod event;
mod persistence;
mod traits;

pub use control_store::ControlStore;
pub use error::{Result, StoreError};
pub use event::Event;
pub use persistence::{Persistence, StorageBackend};
pub use traits::{
    AgentStore, Committed, ContainerStore, CreateContainerRequest, CreateDatasetRequest,
    DataStore, DatasetStore, DeleteContainerRequest, DeleteDatasetRequest, MoveDatasetRequest,
    StateStore,
};
