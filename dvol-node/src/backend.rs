//! Local execution backends.
//!
//! The backend is what actually holds datasets and runs containers on a
//! node. Production backends (ZFS, a container runtime) live outside this
//! crate; [`MemoryBackend`] is used for development and tests.

use std::collections::BTreeMap;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// A dataset attached on this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDataset {
    pub dataset_id: Uuid,
    pub maximum_size: Option<u64>,
    pub path: String,
}

/// A container running on this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalContainer {
    pub name: String,
    pub dataset_ids: Vec<Uuid>,
    pub running: bool,
}

#[async_trait]
pub trait LocalBackend: Send + Sync {
    async fn list_datasets(&self) -> Result<Vec<LocalDataset>>;

    async fn get_dataset(&self, dataset_id: Uuid) -> Result<Option<LocalDataset>>;

    /// Attach (creating if needed) a dataset. Attaching an attached dataset
    /// updates its size limit.
    async fn attach_dataset(&self, dataset_id: Uuid, maximum_size: Option<u64>)
    -> Result<LocalDataset>;

    /// Release a dataset. Releasing an unknown dataset is not an error.
    async fn detach_dataset(&self, dataset_id: Uuid) -> Result<()>;

    async fn list_containers(&self) -> Result<Vec<LocalContainer>>;

    /// Start a container with the given datasets mounted, replacing an
    /// existing container of the same name.
    async fn start_container(&self, name: &str, dataset_ids: &[Uuid]) -> Result<LocalContainer>;

    /// Stop and remove a container. Unknown names are ignored.
    async fn stop_container(&self, name: &str) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    datasets: BTreeMap<Uuid, LocalDataset>,
    containers: BTreeMap<String, LocalContainer>,
}

/// Backend keeping all resources in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: Mutex<MemoryInner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Device path reported for an attached dataset.
    pub fn device_path(dataset_id: Uuid) -> String {
        format!("/dev/dvol/{}", dataset_id)
    }
}

#[async_trait]
impl LocalBackend for MemoryBackend {
    async fn list_datasets(&self) -> Result<Vec<LocalDataset>> {
        Ok(self.inner.lock().await.datasets.values().cloned().collect())
    }

    async fn get_dataset(&self, dataset_id: Uuid) -> Result<Option<LocalDataset>> {
        Ok(self.inner.lock().await.datasets.get(&dataset_id).cloned())
    }

    async fn attach_dataset(
        &self,
        dataset_id: Uuid,
        maximum_size: Option<u64>,
    ) -> Result<LocalDataset> {
        let mut inner = self.inner.lock().await;
        let dataset = inner
            .datasets
            .entry(dataset_id)
            .or_insert_with(|| LocalDataset {
                dataset_id,
                maximum_size,
                path: Self::device_path(dataset_id),
            });
        dataset.maximum_size = maximum_size;
        debug!("Attached dataset {} at {}", dataset_id, dataset.path);
        Ok(dataset.clone())
    }

    async fn detach_dataset(&self, dataset_id: Uuid) -> Result<()> {
        self.inner.lock().await.datasets.remove(&dataset_id);
        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<LocalContainer>> {
        Ok(self.inner.lock().await.containers.values().cloned().collect())
    }

    async fn start_container(&self, name: &str, dataset_ids: &[Uuid]) -> Result<LocalContainer> {
        let mut inner = self.inner.lock().await;
        if let Some(missing) = dataset_ids.iter().find(|id| !inner.datasets.contains_key(*id)) {
            bail!("dataset {} is not attached on this node", missing);
        }
        let container = LocalContainer {
            name: name.to_string(),
            dataset_ids: dataset_ids.to_vec(),
            running: true,
        };
        inner.containers.insert(name.to_string(), container.clone());
        Ok(container)
    }

    async fn stop_container(&self, name: &str) -> Result<()> {
        self.inner.lock().await.containers.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_attach_is_idempotent_and_updates_size() {
        let backend = MemoryBackend::new();
        let id = Uuid::new_v4();

        let first = backend.attach_dataset(id, None).await.unwrap();
        assert_eq!(first.path, format!("/dev/dvol/{}", id));

        let second = backend.attach_dataset(id, Some(1024)).await.unwrap();
        assert_eq!(second.maximum_size, Some(1024));
        assert_eq!(backend.list_datasets().await.unwrap().len(), 1);

        backend.detach_dataset(id).await.unwrap();
        backend.detach_dataset(id).await.unwrap();
        assert!(backend.get_dataset(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_container_requires_attached_datasets() {
        let backend = MemoryBackend::new();
        let id = Uuid::new_v4();

        assert!(backend.start_container("web", &[id]).await.is_err());

        backend.attach_dataset(id, None).await.unwrap();
        let container = backend.start_container("web", &[id]).await.unwrap();
        assert!(container.running);

        backend.stop_container("web").await.unwrap();
        assert!(backend.list_containers().await.unwrap().is_empty());
    }
}
