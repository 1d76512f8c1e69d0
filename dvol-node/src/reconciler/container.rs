//! Container reconciler - runs containers placed on this node.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use dvol_types::{Container, ObservedContainer};
use tracing::info;

use super::Reconciler;
use crate::backend::{LocalBackend, LocalContainer};

pub struct ContainerReconciler {
    backend: Arc<dyn LocalBackend>,
}

impl ContainerReconciler {
    pub fn new(backend: Arc<dyn LocalBackend>) -> Self {
        Self { backend }
    }
}

fn observed(container: LocalContainer) -> ObservedContainer {
    ObservedContainer {
        name: container.name,
        dataset_ids: container.dataset_ids,
        running: container.running,
    }
}

#[async_trait]
impl Reconciler for ContainerReconciler {
    type Spec = Container;
    type Status = ObservedContainer;

    async fn reconcile(&self, id: &str, spec: &Self::Spec) -> Result<Self::Status> {
        let current = self
            .backend
            .list_containers()
            .await?
            .into_iter()
            .find(|c| c.name == spec.name);

        if let Some(current) = current
            && current.running
            && current.dataset_ids == spec.dataset_ids
        {
            return Ok(observed(current));
        }

        info!("Starting container {}", id);
        let container = self
            .backend
            .start_container(&spec.name, &spec.dataset_ids)
            .await
            .with_context(|| format!("Failed to start container {}", id))?;
        Ok(observed(container))
    }

    async fn finalize(&self, id: &str) -> Result<()> {
        info!("Stopping container {}", id);
        self.backend.stop_container(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use dvol_types::Dataset;

    #[tokio::test]
    async fn test_container_restarts_when_mounts_change() {
        let backend = Arc::new(MemoryBackend::new());
        let reconciler = ContainerReconciler::new(backend.clone());
        let dataset = Dataset::new("node-a");
        backend.attach_dataset(dataset.dataset_id, None).await.unwrap();

        let spec = Container::new("web", "node-a");
        let status = reconciler.reconcile("web", &spec).await.unwrap();
        assert!(status.running);
        assert!(status.dataset_ids.is_empty());

        let spec = spec.with_dataset(dataset.dataset_id);
        let status = reconciler.reconcile("web", &spec).await.unwrap();
        assert_eq!(status.dataset_ids, vec![dataset.dataset_id]);

        reconciler.finalize("web").await.unwrap();
        assert!(backend.list_containers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_container_fails_without_local_dataset() {
        let reconciler = ContainerReconciler::new(Arc::new(MemoryBackend::new()));
        let spec = Container::new("web", "node-a").with_dataset(uuid::Uuid::new_v4());
        assert!(reconciler.reconcile("web", &spec).await.is_err());
    }
}
