//! Resource documents exchanged between the control service, clients and agents.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

// =============================================================================
// Desired resources
// =============================================================================

/// A dataset in the desired configuration.
///
/// The JSON form is `{"primary", "dataset_id", "metadata"}`, with
/// `"maximum_size"` present only when set.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Dataset {
    /// Node that owns (attaches) the dataset.
    pub primary: String,
    pub dataset_id: Uuid,
    /// Opaque user metadata, never interpreted by the control service.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_size: Option<u64>,
}

impl Dataset {
    /// New dataset on `primary` with a fresh random id.
    pub fn new(primary: impl Into<String>) -> Self {
        Self::with_id(primary, Uuid::new_v4())
    }

    pub fn with_id(primary: impl Into<String>, dataset_id: Uuid) -> Self {
        Self {
            primary: primary.into(),
            dataset_id,
            metadata: BTreeMap::new(),
            maximum_size: None,
        }
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

/// A container bound to one node, referencing datasets by id.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Container {
    pub name: String,
    pub node: String,
    #[serde(default)]
    pub dataset_ids: Vec<Uuid>,
}

impl Container {
    pub fn new(name: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node: node.into(),
            dataset_ids: Vec::new(),
        }
    }

    pub fn with_dataset(mut self, dataset_id: Uuid) -> Self {
        self.dataset_ids.push(dataset_id);
        self
    }
}

// =============================================================================
// Observed resources
// =============================================================================

/// Attachment status of a dataset as reported by the node holding it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DatasetStatus {
    Attaching,
    Attached,
    Detaching,
}

/// One dataset as seen by the agent on a node.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ObservedDataset {
    pub dataset_id: Uuid,
    pub status: DatasetStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_size: Option<u64>,
    /// Local device or mount path, when attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// One container as seen by the agent on a node.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ObservedContainer {
    pub name: String,
    #[serde(default)]
    pub dataset_ids: Vec<Uuid>,
    pub running: bool,
}

/// Full snapshot of a node's local resources, pushed by its agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct NodeStateReport {
    /// Agent-local reporting epoch; must increase with every report.
    pub epoch: u64,
    #[serde(default)]
    pub datasets: Vec<ObservedDataset>,
    #[serde(default)]
    pub containers: Vec<ObservedContainer>,
}

/// Desired resources for a single node, pulled by its agent.
///
/// Anything the agent holds that is not listed here must be released.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct NodeManifest {
    pub node: String,
    /// Configuration version this manifest was computed from.
    pub version: u64,
    pub datasets: Vec<Dataset>,
    pub containers: Vec<Container>,
}

// =============================================================================
// Query projections
// =============================================================================

/// Read-only projection of one dataset's observed placement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct DatasetState {
    pub dataset_id: Uuid,
    /// Node currently holding the dataset.
    pub primary: String,
    pub status: DatasetStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Read-only projection of one container's observed placement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ContainerState {
    pub name: String,
    pub node: String,
    #[serde(default)]
    pub dataset_ids: Vec<Uuid>,
    pub running: bool,
}

/// A cluster node known to the control service.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: String,
    /// Last accepted reporting epoch (0 if the node never reported).
    pub epoch: u64,
    /// RFC 3339 timestamp of the last accepted report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_at: Option<String>,
}
