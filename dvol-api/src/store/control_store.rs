//! ControlStore - the authoritative owner of desired configuration and
//! aggregated observed state.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;

use async_trait::async_trait;
use chrono::Utc;
use dvol_types::{
    Command, Configuration, Container, ContainerState, Dataset, DatasetState, NodeInfo,
    NodeManifest, NodeStateReport, ObservedState, Response,
};
use lru::LruCache;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};
use uuid::Uuid;

use super::error::{Result, StoreError};
use super::event::Event;
use super::persistence::{Persistence, StorageBackend};
use super::traits::{
    AgentStore, Committed, ContainerStore, CreateContainerRequest, CreateDatasetRequest,
    DataStore, DatasetStore, DeleteContainerRequest, DeleteDatasetRequest, MoveDatasetRequest,
    StateStore,
};

const IDEMPOTENCY_CACHE_SIZE: NonZeroUsize = NonZeroUsize::new(1000).unwrap();
const EVENT_CHANNEL_CAPACITY: usize = 256;

struct Inner {
    configuration: Configuration,
    state: ObservedState,
    /// Idempotency cache for request deduplication, keyed by request id.
    /// The command kind is kept so a reused id cannot answer a different operation.
    applied_requests: LruCache<String, (&'static str, Committed<Response>)>,
}

/// In-process control store.
///
/// Mutations are serialized by a single write lock and are persisted before
/// their result is returned. Reads take the read lock and return snapshots.
pub struct ControlStore {
    inner: RwLock<Inner>,
    persistence: Persistence,
    events: broadcast::Sender<Event>,
}

impl ControlStore {
    /// Open a store, loading any previously saved configuration.
    pub async fn open(backend: StorageBackend) -> Result<Self> {
        let persistence = Persistence::new(backend);
        let configuration = persistence.load().await?.unwrap_or_default();
        Ok(Self::with_configuration(configuration, persistence))
    }

    /// Ephemeral store for development and tests.
    pub fn in_memory() -> Self {
        Self::with_configuration(
            Configuration::default(),
            Persistence::new(StorageBackend::Memory),
        )
    }

    fn with_configuration(configuration: Configuration, persistence: Persistence) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: RwLock::new(Inner {
                configuration,
                state: ObservedState::default(),
                applied_requests: LruCache::new(IDEMPOTENCY_CACHE_SIZE),
            }),
            persistence,
            events,
        }
    }

    /// Snapshot of the desired configuration.
    pub async fn configuration(&self) -> Configuration {
        self.inner.read().await.configuration.clone()
    }

    /// Apply a command, persist the result and broadcast the change.
    async fn write_command(&self, cmd: Command) -> Result<Committed<Response>> {
        let mut inner = self.inner.write().await;

        if let Some((kind, cached)) = inner.applied_requests.peek(cmd.request_id()) {
            if *kind != cmd.kind() {
                return Err(StoreError::Invalid(format!(
                    "request id {} was already used for {}",
                    cmd.request_id(),
                    kind
                )));
            }
            debug!("Request {} already applied, returning cached result", cmd.request_id());
            return Ok(cached.clone());
        }

        let request_id = cmd.request_id().to_string();
        let kind = cmd.kind();
        let previous_primary = match &cmd {
            Command::MoveDataset { dataset_id, .. } => inner
                .configuration
                .dataset(dataset_id)
                .map(|d| d.primary.clone()),
            _ => None,
        };
        let applied = cmd.clone();

        // Work on a copy so a failed save leaves the committed configuration untouched.
        let mut next = inner.configuration.clone();
        let response = next.apply(cmd)?;
        self.persistence.save(&next).await?;

        let version = next.version();
        inner.configuration = next;
        let committed = Committed {
            value: response,
            version,
        };
        inner
            .applied_requests
            .put(request_id, (kind, committed.clone()));
        drop(inner);

        let event = event_for(&applied, &committed.value, previous_primary, version);
        let _ = self.events.send(event);
        Ok(committed)
    }
}

fn new_request_id(request_id: Option<String>) -> String {
    request_id.unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn event_for(
    cmd: &Command,
    response: &Response,
    previous_primary: Option<String>,
    version: u64,
) -> Event {
    match (cmd, response.clone()) {
        (Command::CreateDataset { .. }, Response::Dataset(dataset)) => {
            Event::DatasetCreated { dataset, version }
        }
        (Command::MoveDataset { .. }, Response::Dataset(dataset)) => Event::DatasetMoved {
            from: previous_primary.unwrap_or_default(),
            dataset,
            version,
        },
        (_, Response::Dataset(dataset)) => Event::DatasetDeleted { dataset, version },
        (Command::CreateContainer { .. }, Response::Container(container)) => {
            Event::ContainerCreated { container, version }
        }
        (_, Response::Container(container)) => Event::ContainerDeleted { container, version },
    }
}

fn expect_dataset(committed: Committed<Response>) -> Result<Committed<Dataset>> {
    match committed.value {
        Response::Dataset(dataset) => Ok(Committed {
            value: dataset,
            version: committed.version,
        }),
        _ => Err(StoreError::Internal("unexpected response".into())),
    }
}

fn expect_container(committed: Committed<Response>) -> Result<Committed<Container>> {
    match committed.value {
        Response::Container(container) => Ok(Committed {
            value: container,
            version: committed.version,
        }),
        _ => Err(StoreError::Internal("unexpected response".into())),
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StoreError::Invalid(format!("{} must not be empty", field)));
    }
    Ok(())
}

#[async_trait]
impl DatasetStore for ControlStore {
    async fn list_datasets(&self) -> Result<Vec<Dataset>> {
        let inner = self.inner.read().await;
        Ok(inner.configuration.datasets().cloned().collect())
    }

    async fn get_dataset(&self, id: &Uuid) -> Result<Option<Dataset>> {
        let inner = self.inner.read().await;
        Ok(inner.configuration.dataset(id).cloned())
    }

    async fn create_dataset(&self, req: CreateDatasetRequest) -> Result<Committed<Dataset>> {
        require_non_empty("primary", &req.primary)?;
        let cmd = Command::CreateDataset {
            request_id: new_request_id(req.request_id),
            dataset: Dataset {
                primary: req.primary,
                dataset_id: req.dataset_id.unwrap_or_else(Uuid::new_v4),
                metadata: req.metadata,
                maximum_size: req.maximum_size,
            },
        };
        expect_dataset(self.write_command(cmd).await?)
    }

    async fn move_dataset(&self, id: Uuid, req: MoveDatasetRequest) -> Result<Committed<Dataset>> {
        require_non_empty("primary", &req.primary)?;
        let cmd = Command::MoveDataset {
            request_id: new_request_id(req.request_id),
            dataset_id: id,
            primary: req.primary,
            expected_version: req.expected_version,
        };
        expect_dataset(self.write_command(cmd).await?)
    }

    async fn delete_dataset(
        &self,
        id: Uuid,
        req: DeleteDatasetRequest,
    ) -> Result<Committed<Dataset>> {
        let cmd = Command::DeleteDataset {
            request_id: new_request_id(req.request_id),
            dataset_id: id,
            expected_version: req.expected_version,
        };
        expect_dataset(self.write_command(cmd).await?)
    }
}

#[async_trait]
impl ContainerStore for ControlStore {
    async fn list_containers(&self) -> Result<Vec<Container>> {
        let inner = self.inner.read().await;
        Ok(inner.configuration.containers().cloned().collect())
    }

    async fn create_container(&self, req: CreateContainerRequest) -> Result<Committed<Container>> {
        require_non_empty("name", &req.name)?;
        require_non_empty("node", &req.node)?;
        let cmd = Command::CreateContainer {
            request_id: new_request_id(req.request_id),
            container: Container {
                name: req.name,
                node: req.node,
                dataset_ids: req.dataset_ids,
            },
        };
        expect_container(self.write_command(cmd).await?)
    }

    async fn delete_container(
        &self,
        name: &str,
        req: DeleteContainerRequest,
    ) -> Result<Committed<Container>> {
        let cmd = Command::DeleteContainer {
            request_id: new_request_id(req.request_id),
            name: name.to_string(),
        };
        expect_container(self.write_command(cmd).await?)
    }
}

#[async_trait]
impl StateStore for ControlStore {
    async fn list_dataset_state(&self) -> Result<Vec<DatasetState>> {
        let inner = self.inner.read().await;
        Ok(inner.state.dataset_states())
    }

    async fn list_container_state(&self) -> Result<Vec<ContainerState>> {
        let inner = self.inner.read().await;
        Ok(inner.state.container_states())
    }

    async fn list_nodes(&self) -> Result<Vec<NodeInfo>> {
        let inner = self.inner.read().await;
        let mut ids: BTreeSet<String> = inner.configuration.referenced_nodes();
        ids.extend(inner.state.node_ids().map(str::to_string));
        Ok(ids.iter().map(|id| inner.state.node_info(id)).collect())
    }
}

#[async_trait]
impl AgentStore for ControlStore {
    async fn manifest_for(&self, node: &str) -> Result<NodeManifest> {
        let inner = self.inner.read().await;
        Ok(inner.configuration.manifest_for(node))
    }

    async fn report_state(&self, node: &str, report: NodeStateReport) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let Inner {
            configuration,
            state,
            ..
        } = &mut *inner;

        let epoch = report.epoch;
        if !state.merge(node, report, Utc::now().to_rfc3339()) {
            debug!("Ignoring stale report from {} (epoch {})", node, epoch);
            return Ok(false);
        }

        let mut collected_event = None;
        let collectable = configuration
            .dataset_entries()
            .any(|e| e.deleted && !state.holds_dataset(&e.dataset.dataset_id));
        if collectable {
            let mut next = configuration.clone();
            let ids = next.collect_tombstones(|id| state.holds_dataset(id));
            self.persistence.save(&next).await?;
            info!("Collected {} deleted dataset(s)", ids.len());
            collected_event = Some(Event::DatasetsCollected {
                ids,
                version: next.version(),
            });
            *configuration = next;
        }
        drop(inner);

        let _ = self.events.send(Event::StateReported {
            node: node.to_string(),
            epoch,
        });
        if let Some(event) = collected_event {
            let _ = self.events.send(event);
        }
        Ok(true)
    }
}

impl DataStore for ControlStore {
    fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvol_types::{DatasetStatus, ErrorKind, ObservedDataset};

    fn create_req(primary: &str) -> CreateDatasetRequest {
        CreateDatasetRequest {
            primary: primary.to_string(),
            ..Default::default()
        }
    }

    fn attached(id: Uuid) -> ObservedDataset {
        ObservedDataset {
            dataset_id: id,
            status: DatasetStatus::Attached,
            maximum_size: None,
            path: None,
        }
    }

    fn report(epoch: u64, ids: &[Uuid]) -> NodeStateReport {
        NodeStateReport {
            epoch,
            datasets: ids.iter().map(|id| attached(*id)).collect(),
            containers: vec![],
        }
    }

    #[tokio::test]
    async fn test_create_dataset_generates_id() {
        let store = ControlStore::in_memory();
        let created = store.create_dataset(create_req("node-1")).await.unwrap();
        assert_eq!(created.version, 1);
        assert_eq!(created.value.primary, "node-1");
        assert_eq!(
            store.get_dataset(&created.value.dataset_id).await.unwrap(),
            Some(created.value)
        );
    }

    #[tokio::test]
    async fn test_create_dataset_empty_primary() {
        let store = ControlStore::in_memory();
        let err = store.create_dataset(create_req("  ")).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_create_dataset_conflict() {
        let store = ControlStore::in_memory();
        let id = Uuid::new_v4();
        let req = CreateDatasetRequest {
            dataset_id: Some(id),
            ..create_req("node-1")
        };
        store.create_dataset(req.clone()).await.unwrap();
        let err = store.create_dataset(req).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_idempotent_request_id() {
        let store = ControlStore::in_memory();
        let req = CreateDatasetRequest {
            request_id: Some("req-1".into()),
            ..create_req("node-1")
        };
        let first = store.create_dataset(req.clone()).await.unwrap();
        // A retry generates a different dataset id but carries the same request id
        let second = store.create_dataset(req).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.list_datasets().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_request_id_reuse_across_operations_is_rejected() {
        let store = ControlStore::in_memory();
        store
            .create_dataset(CreateDatasetRequest {
                request_id: Some("req-1".into()),
                ..create_req("node-1")
            })
            .await
            .unwrap();

        let err = store
            .create_container(CreateContainerRequest {
                name: "web".into(),
                node: "node-1".into(),
                request_id: Some("req-1".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(store.list_containers().await.unwrap().is_empty());
        assert_eq!(store.configuration().await.version(), 1);
    }

    #[tokio::test]
    async fn test_move_does_not_touch_state() {
        let store = ControlStore::in_memory();
        let created = store.create_dataset(create_req("node-1")).await.unwrap();
        let id = created.value.dataset_id;
        store.report_state("node-1", report(1, &[id])).await.unwrap();

        let moved = store
            .move_dataset(
                id,
                MoveDatasetRequest {
                    primary: "node-2".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.value.primary, "node-2");

        // Observed state still shows the old primary until node-2 reports
        let states = store.list_dataset_state().await.unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].primary, "node-1");
    }

    #[tokio::test]
    async fn test_move_stale_version() {
        let store = ControlStore::in_memory();
        let created = store.create_dataset(create_req("node-1")).await.unwrap();
        let id = created.value.dataset_id;
        let move_req = |primary: &str| MoveDatasetRequest {
            primary: primary.into(),
            expected_version: Some(created.version),
            ..Default::default()
        };

        store.move_dataset(id, move_req("node-2")).await.unwrap();
        let err = store.move_dataset(id, move_req("node-3")).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionMismatch {
                expected: 1,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_delete_collects_tombstone_after_report() {
        let store = ControlStore::in_memory();
        let id = store
            .create_dataset(create_req("node-1"))
            .await
            .unwrap()
            .value
            .dataset_id;
        store.report_state("node-1", report(1, &[id])).await.unwrap();

        store
            .delete_dataset(id, DeleteDatasetRequest::default())
            .await
            .unwrap();
        assert!(store.list_datasets().await.unwrap().is_empty());
        assert!(store.manifest_for("node-1").await.unwrap().datasets.is_empty());
        // Still reported, so the tombstone stays
        assert!(store.configuration().await.is_tombstoned(&id));

        store.report_state("node-1", report(2, &[])).await.unwrap();
        assert!(store.configuration().await.dataset_entry(&id).is_none());
        assert!(store.list_dataset_state().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_report_ignored() {
        let store = ControlStore::in_memory();
        let id = Uuid::new_v4();
        assert!(store.report_state("node-1", report(3, &[id])).await.unwrap());
        assert!(!store.report_state("node-1", report(2, &[])).await.unwrap());
        assert_eq!(store.list_dataset_state().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_nodes_includes_configured_and_reporting() {
        let store = ControlStore::in_memory();
        store.create_dataset(create_req("node-1")).await.unwrap();
        store.report_state("node-2", report(4, &[])).await.unwrap();

        let nodes = store.list_nodes().await.unwrap();
        let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["node-1", "node-2"]);
        assert_eq!(nodes[0].epoch, 0);
        assert_eq!(nodes[1].epoch, 4);
        assert!(nodes[1].reported_at.is_some());
    }

    #[tokio::test]
    async fn test_events_broadcast() {
        let store = ControlStore::in_memory();
        let mut events = store.subscribe();

        let created = store.create_dataset(create_req("node-1")).await.unwrap();
        match events.recv().await.unwrap() {
            Event::DatasetCreated { dataset, version } => {
                assert_eq!(dataset, created.value);
                assert_eq!(version, 1);
            }
            other => panic!("unexpected event {:?}", other),
        }

        store
            .move_dataset(
                created.value.dataset_id,
                MoveDatasetRequest {
                    primary: "node-2".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        match events.recv().await.unwrap() {
            Event::DatasetMoved { from, dataset, .. } => {
                assert_eq!(from, "node-1");
                assert_eq!(dataset.primary, "node-2");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_open_reloads_persisted_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let backend = StorageBackend::File {
            path: dir.path().join("configuration.json"),
        };

        let store = ControlStore::open(backend.clone()).await.unwrap();
        let created = store.create_dataset(create_req("node-1")).await.unwrap();
        store
            .create_container(CreateContainerRequest {
                name: "web".into(),
                node: "node-1".into(),
                dataset_ids: vec![created.value.dataset_id],
                ..Default::default()
            })
            .await
            .unwrap();
        drop(store);

        let reopened = ControlStore::open(backend).await.unwrap();
        assert_eq!(
            reopened.list_datasets().await.unwrap(),
            vec![created.value]
        );
        assert_eq!(reopened.list_containers().await.unwrap().len(), 1);
        assert_eq!(reopened.configuration().await.version(), 2);
    }
}
