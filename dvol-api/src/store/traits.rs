//! DataStore trait definitions.
//!
//! These traits let handlers work with domain objects instead of commands.

use std::collections::BTreeMap;

use async_trait::async_trait;
use dvol_types::{
    Container, ContainerState, Dataset, DatasetState, NodeInfo, NodeManifest, NodeStateReport,
};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::error::Result;
use super::event::Event;

// =============================================================================
// Request DTOs
// =============================================================================

/// A result together with the configuration version that committed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed<T> {
    pub value: T,
    pub version: u64,
}

/// Request to create a dataset.
#[derive(Debug, Clone, Default)]
pub struct CreateDatasetRequest {
    /// Idempotency key; a fresh one is generated when absent.
    pub request_id: Option<String>,
    pub primary: String,
    /// Server-generated when absent.
    pub dataset_id: Option<Uuid>,
    pub metadata: BTreeMap<String, String>,
    pub maximum_size: Option<u64>,
}

/// Request to change a dataset's primary.
#[derive(Debug, Clone, Default)]
pub struct MoveDatasetRequest {
    pub request_id: Option<String>,
    pub primary: String,
    pub expected_version: Option<u64>,
}

/// Request to tombstone a dataset.
#[derive(Debug, Clone, Default)]
pub struct DeleteDatasetRequest {
    pub request_id: Option<String>,
    pub expected_version: Option<u64>,
}

/// Request to create a container.
#[derive(Debug, Clone, Default)]
pub struct CreateContainerRequest {
    pub request_id: Option<String>,
    pub name: String,
    pub node: String,
    pub dataset_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteContainerRequest {
    pub request_id: Option<String>,
}

// =============================================================================
// Domain Store Traits
// =============================================================================

/// Store trait for dataset configuration.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// List live datasets in the configuration.
    async fn list_datasets(&self) -> Result<Vec<Dataset>>;

    /// Get a live dataset by ID.
    async fn get_dataset(&self, id: &Uuid) -> Result<Option<Dataset>>;

    /// Create a dataset. Does not wait for any node to attach it.
    async fn create_dataset(&self, req: CreateDatasetRequest) -> Result<Committed<Dataset>>;

    /// Change a dataset's primary.
    async fn move_dataset(&self, id: Uuid, req: MoveDatasetRequest) -> Result<Committed<Dataset>>;

    /// Tombstone a dataset so agents release it.
    async fn delete_dataset(
        &self,
        id: Uuid,
        req: DeleteDatasetRequest,
    ) -> Result<Committed<Dataset>>;
}

/// Store trait for container configuration.
#[async_trait]
pub trait ContainerStore: Send + Sync {
    async fn list_containers(&self) -> Result<Vec<Container>>;

    async fn create_container(&self, req: CreateContainerRequest) -> Result<Committed<Container>>;

    async fn delete_container(
        &self,
        name: &str,
        req: DeleteContainerRequest,
    ) -> Result<Committed<Container>>;
}

/// Store trait for observed state queries. Never blocks on convergence.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn list_dataset_state(&self) -> Result<Vec<DatasetState>>;

    async fn list_container_state(&self) -> Result<Vec<ContainerState>>;

    /// Nodes that reported state or are referenced by the configuration.
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>>;
}

/// Store trait for the node agent side of the convergence loop.
#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Desired resources for one node.
    async fn manifest_for(&self, node: &str) -> Result<NodeManifest>;

    /// Merge a node report. Returns `false` if the report was stale.
    async fn report_state(&self, node: &str, report: NodeStateReport) -> Result<bool>;
}

// =============================================================================
// Composite DataStore Trait
// =============================================================================

/// Composite data store trait combining all domain stores.
pub trait DataStore:
    DatasetStore + ContainerStore + StateStore + AgentStore + Send + Sync
{
    /// Subscribe to change events.
    fn subscribe(&self) -> broadcast::Receiver<Event>;
}
