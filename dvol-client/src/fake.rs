//! In-memory convergence simulator.
//!
//! Mutations only touch the configuration. Observed state stays where it
//! was until [`SynchronizableClient::synchronize_state`] runs one
//! convergence pass.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use dvol_types::{
    Command, Configuration, Container, ContainerState, Dataset, DatasetState, DatasetStatus,
    NodeInfo, ObservedContainer, ObservedDataset, ObservedState, Response,
};
use tracing::debug;
use uuid::Uuid;

use crate::client::{ClusterClient, CreateDatasetRequest, SynchronizableClient};
use crate::error::{ClientError, Result};

#[derive(Debug, Default)]
struct Cluster {
    configuration: Configuration,
    state: ObservedState,
}

/// Simulated cluster holding configuration and observed state in memory.
#[derive(Debug, Default)]
pub struct FakeClient {
    cluster: Mutex<Cluster>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the desired configuration, tombstones included.
    pub fn configuration(&self) -> Configuration {
        self.lock().configuration.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Cluster> {
        self.cluster.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, cmd: Command) -> Result<Response> {
        let mut cluster = self.lock();
        Ok(cluster.configuration.apply(cmd)?)
    }

    fn apply_dataset(&self, cmd: Command) -> Result<Dataset> {
        match self.apply(cmd)? {
            Response::Dataset(dataset) => Ok(dataset),
            other => Err(unexpected(other)),
        }
    }

    fn apply_container(&self, cmd: Command) -> Result<Container> {
        match self.apply(cmd)? {
            Response::Container(container) => Ok(container),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: Response) -> ClientError {
    ClientError::UnexpectedResponse {
        status: 500,
        message: format!("unexpected command response: {:?}", response),
    }
}

fn request_id() -> String {
    Uuid::new_v4().to_string()
}

#[async_trait]
impl ClusterClient for FakeClient {
    async fn create_dataset(&self, req: CreateDatasetRequest) -> Result<Dataset> {
        let dataset = Dataset {
            primary: req.primary,
            dataset_id: req.dataset_id.unwrap_or_else(Uuid::new_v4),
            metadata: req.metadata,
            maximum_size: req.maximum_size,
        };
        self.apply_dataset(Command::CreateDataset {
            request_id: request_id(),
            dataset,
        })
    }

    async fn move_dataset(&self, dataset_id: Uuid, primary: &str) -> Result<Dataset> {
        self.apply_dataset(Command::MoveDataset {
            request_id: request_id(),
            dataset_id,
            primary: primary.to_string(),
            expected_version: None,
        })
    }

    async fn delete_dataset(&self, dataset_id: Uuid) -> Result<Dataset> {
        self.apply_dataset(Command::DeleteDataset {
            request_id: request_id(),
            dataset_id,
            expected_version: None,
        })
    }

    async fn create_container(&self, container: Container) -> Result<Container> {
        self.apply_container(Command::CreateContainer {
            request_id: request_id(),
            container,
        })
    }

    async fn delete_container(&self, name: &str) -> Result<Container> {
        self.apply_container(Command::DeleteContainer {
            request_id: request_id(),
            name: name.to_string(),
        })
    }

    async fn list_datasets_configuration(&self) -> Result<Vec<Dataset>> {
        Ok(self.lock().configuration.datasets().cloned().collect())
    }

    async fn list_dataset_state(&self) -> Result<Vec<DatasetState>> {
        Ok(self.lock().state.dataset_states())
    }

    async fn list_containers_configuration(&self) -> Result<Vec<Container>> {
        Ok(self.lock().configuration.containers().cloned().collect())
    }

    async fn list_container_state(&self) -> Result<Vec<ContainerState>> {
        Ok(self.lock().state.container_states())
    }

    async fn list_nodes(&self) -> Result<Vec<NodeInfo>> {
        let cluster = self.lock();
        let mut ids = cluster.configuration.referenced_nodes();
        ids.extend(cluster.state.node_ids().map(str::to_string));
        Ok(ids.iter().map(|id| cluster.state.node_info(id)).collect())
    }
}

impl SynchronizableClient for FakeClient {
    fn synchronize_state(&self) {
        let mut guard = self.lock();
        let Cluster {
            configuration,
            state,
        } = &mut *guard;

        for entry in configuration.dataset_entries() {
            let id = entry.dataset.dataset_id;
            state.remove_dataset(&id);
            if entry.deleted {
                continue;
            }
            state.node_mut(&entry.dataset.primary).datasets.insert(
                id,
                ObservedDataset {
                    dataset_id: id,
                    status: DatasetStatus::Attached,
                    maximum_size: entry.dataset.maximum_size,
                    path: None,
                },
            );
        }

        let collected = configuration.collect_tombstones(|id| state.holds_dataset(id));
        if !collected.is_empty() {
            debug!("Collected {} dataset tombstones", collected.len());
        }

        let placed: Vec<(String, String)> = state
            .container_states()
            .into_iter()
            .map(|c| (c.name, c.node))
            .collect();
        for (name, node) in placed {
            let wanted = configuration
                .container(&name)
                .is_some_and(|c| c.node == node);
            if !wanted {
                state.node_mut(&node).containers.remove(&name);
            }
        }

        for container in configuration.containers() {
            state.node_mut(&container.node).containers.insert(
                container.name.clone(),
                ObservedContainer {
                    name: container.name.clone(),
                    dataset_ids: container.dataset_ids.clone(),
                    running: true,
                },
            );
        }
    }
}
