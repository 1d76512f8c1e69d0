use async_trait::async_trait;
use dvol_types::{Container, ContainerState, Dataset, DatasetState, NodeInfo};
use uuid::Uuid;

use crate::client::{ClusterClient, CreateDatasetRequest, SynchronizableClient};
use crate::error::Result;

/// Wraps a simulator and converges after every mutation, so observed state
/// always matches the configuration once a call returns.
#[derive(Debug, Default)]
pub struct FastConvergingClient<C> {
    inner: C,
}

impl<C: SynchronizableClient> FastConvergingClient<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    /// Synchronize regardless of the outcome, then hand the result back.
    fn converged<T>(&self, result: Result<T>) -> Result<T> {
        self.inner.synchronize_state();
        result
    }
}

#[async_trait]
impl<C: SynchronizableClient> ClusterClient for FastConvergingClient<C> {
    async fn create_dataset(&self, req: CreateDatasetRequest) -> Result<Dataset> {
        let result = self.inner.create_dataset(req).await;
        self.converged(result)
    }

    async fn move_dataset(&self, dataset_id: Uuid, primary: &str) -> Result<Dataset> {
        let result = self.inner.move_dataset(dataset_id, primary).await;
        self.converged(result)
    }

    async fn delete_dataset(&self, dataset_id: Uuid) -> Result<Dataset> {
        let result = self.inner.delete_dataset(dataset_id).await;
        self.converged(result)
    }

    async fn create_container(&self, container: Container) -> Result<Container> {
        let result = self.inner.create_container(container).await;
        self.converged(result)
    }

    async fn delete_container(&self, name: &str) -> Result<Container> {
        let result = self.inner.delete_container(name).await;
        self.converged(result)
    }

    async fn list_datasets_configuration(&self) -> Result<Vec<Dataset>> {
        self.inner.list_datasets_configuration().await
    }

    async fn list_dataset_state(&self) -> Result<Vec<DatasetState>> {
        self.inner.list_dataset_state().await
    }

    async fn list_containers_configuration(&self) -> Result<Vec<Container>> {
        self.inner.list_containers_configuration().await
    }

    async fn list_container_state(&self) -> Result<Vec<ContainerState>> {
        self.inner.list_container_state().await
    }

    async fn list_nodes(&self) -> Result<Vec<NodeInfo>> {
        self.inner.list_nodes().await
    }
}

impl<C: SynchronizableClient> SynchronizableClient for FastConvergingClient<C> {
    fn synchronize_state(&self) {
        self.inner.synchronize_state();
    }
}
