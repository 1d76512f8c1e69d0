//! Reconcilers for the resource types a node holds.
//!
//! Each reconciler compares the desired spec from the manifest with what
//! the local backend reports and takes actions to converge.

pub mod container;
pub mod dataset;

use anyhow::Result;
use async_trait::async_trait;

pub use container::ContainerReconciler;
pub use dataset::DatasetReconciler;

#[async_trait]
pub trait Reconciler: Send + Sync {
    /// The spec type from the manifest.
    type Spec;
    /// The observed status reported back.
    type Status;

    /// Converge the resource towards `spec`.
    async fn reconcile(&self, id: &str, spec: &Self::Spec) -> Result<Self::Status>;

    /// Release the resource once it left the manifest.
    async fn finalize(&self, id: &str) -> Result<()>;
}
