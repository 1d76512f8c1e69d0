//! Dataset reconciler - attaches datasets whose primary is this node.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use dvol_types::{Dataset, DatasetStatus, ObservedDataset};
use tracing::info;
use uuid::Uuid;

use super::Reconciler;
use crate::backend::{LocalBackend, LocalDataset};

pub struct DatasetReconciler {
    backend: Arc<dyn LocalBackend>,
}

impl DatasetReconciler {
    pub fn new(backend: Arc<dyn LocalBackend>) -> Self {
        Self { backend }
    }
}

fn observed(dataset: LocalDataset) -> ObservedDataset {
    ObservedDataset {
        dataset_id: dataset.dataset_id,
        status: DatasetStatus::Attached,
        maximum_size: dataset.maximum_size,
        path: Some(dataset.path),
    }
}

#[async_trait]
impl Reconciler for DatasetReconciler {
    type Spec = Dataset;
    type Status = ObservedDataset;

    async fn reconcile(&self, id: &str, spec: &Self::Spec) -> Result<Self::Status> {
        if let Some(local) = self.backend.get_dataset(spec.dataset_id).await?
            && local.maximum_size == spec.maximum_size
        {
            return Ok(observed(local));
        }

        info!("Attaching dataset {}", id);
        let local = self
            .backend
            .attach_dataset(spec.dataset_id, spec.maximum_size)
            .await
            .with_context(|| format!("Failed to attach dataset {}", id))?;
        Ok(observed(local))
    }

    async fn finalize(&self, id: &str) -> Result<()> {
        info!("Detaching dataset {}", id);
        let dataset_id = Uuid::parse_str(id).context("Invalid dataset id")?;
        self.backend.detach_dataset(dataset_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    #[tokio::test]
    async fn test_reconcile_attaches_then_finalize_detaches() {
        let backend = Arc::new(MemoryBackend::new());
        let reconciler = DatasetReconciler::new(backend.clone());
        let spec = Dataset::new("node-a").maximum_size(4096);
        let id = spec.dataset_id.to_string();

        let status = reconciler.reconcile(&id, &spec).await.unwrap();
        assert_eq!(status.status, DatasetStatus::Attached);
        assert_eq!(status.maximum_size, Some(4096));
        assert_eq!(status.path, Some(MemoryBackend::device_path(spec.dataset_id)));

        reconciler.finalize(&id).await.unwrap();
        assert!(backend.list_datasets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_finalize_rejects_malformed_id() {
        let reconciler = DatasetReconciler::new(Arc::new(MemoryBackend::new()));
        assert!(reconciler.finalize("not-a-uuid").await.is_err());
    }
}
