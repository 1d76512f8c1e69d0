//! Events emitted when the configuration or observed state changes.

use dvol_types::{Container, Dataset};
use uuid::Uuid;

/// Events dispatched via a broadcast channel after a change is committed.
#[derive(Debug, Clone)]
pub enum Event {
    // Dataset events
    /// A new dataset was added to the configuration.
    DatasetCreated { dataset: Dataset, version: u64 },
    /// A dataset's primary was changed.
    DatasetMoved {
        dataset: Dataset,
        from: String,
        version: u64,
    },
    /// A dataset was tombstoned.
    DatasetDeleted { dataset: Dataset, version: u64 },
    /// Tombstones no node reports any more were dropped.
    DatasetsCollected { ids: Vec<Uuid>, version: u64 },

    // Container events
    ContainerCreated { container: Container, version: u64 },
    ContainerDeleted { container: Container, version: u64 },

    // Observed state events
    /// A node report was merged into the observed state.
    StateReported { node: String, epoch: u64 },
}

impl Event {
    /// Get the resource type for this event.
    pub fn resource_type(&self) -> &'static str {
        match self {
            Event::DatasetCreated { .. }
            | Event::DatasetMoved { .. }
            | Event::DatasetDeleted { .. }
            | Event::DatasetsCollected { .. } => "dataset",
            Event::ContainerCreated { .. } | Event::ContainerDeleted { .. } => "container",
            Event::StateReported { .. } => "node",
        }
    }

    /// Configuration version produced by this change, if it changed the
    /// configuration at all.
    pub fn configuration_version(&self) -> Option<u64> {
        match self {
            Event::DatasetCreated { version, .. }
            | Event::DatasetMoved { version, .. }
            | Event::DatasetDeleted { version, .. }
            | Event::DatasetsCollected { version, .. }
            | Event::ContainerCreated { version, .. }
            | Event::ContainerDeleted { version, .. } => Some(*version),
            Event::StateReported { .. } => None,
        }
    }
}
