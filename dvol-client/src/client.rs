//! The client capability set.

use std::collections::BTreeMap;

use async_trait::async_trait;
use dvol_types::{Container, ContainerState, Dataset, DatasetState, NodeInfo};
use uuid::Uuid;

use crate::error::Result;

/// Parameters for creating a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateDatasetRequest {
    pub primary: String,
    /// Generated when absent.
    pub dataset_id: Option<Uuid>,
    pub metadata: BTreeMap<String, String>,
    pub maximum_size: Option<u64>,
}

impl CreateDatasetRequest {
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            ..Default::default()
        }
    }

    pub fn dataset_id(mut self, dataset_id: Uuid) -> Self {
        self.dataset_id = Some(dataset_id);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn maximum_size(mut self, bytes: u64) -> Self {
        self.maximum_size = Some(bytes);
        self
    }
}

/// A mutation result with the configuration version it was committed at,
/// when the transport reports one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: Option<u64>,
}

/// Operations offered by the control service.
///
/// A mutation resolves once the configuration change is recorded. It does
/// not mean the observed state has converged.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn create_dataset(&self, req: CreateDatasetRequest) -> Result<Dataset>;

    async fn move_dataset(&self, dataset_id: Uuid, primary: &str) -> Result<Dataset>;

    async fn delete_dataset(&self, dataset_id: Uuid) -> Result<Dataset>;

    async fn create_container(&self, container: Container) -> Result<Container>;

    async fn delete_container(&self, name: &str) -> Result<Container>;

    /// Datasets in the desired configuration.
    async fn list_datasets_configuration(&self) -> Result<Vec<Dataset>>;

    /// Observed dataset placement; may lag the configuration.
    async fn list_dataset_state(&self) -> Result<Vec<DatasetState>>;

    async fn list_containers_configuration(&self) -> Result<Vec<Container>>;

    async fn list_container_state(&self) -> Result<Vec<ContainerState>>;

    async fn list_nodes(&self) -> Result<Vec<NodeInfo>>;
}

/// A client whose convergence can be driven explicitly.
pub trait SynchronizableClient: ClusterClient {
    /// Run one deterministic convergence pass.
    fn synchronize_state(&self);
}
