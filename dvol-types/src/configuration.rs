//! Desired configuration and the commands that mutate it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::error::ConfigError;
use crate::model::{Container, Dataset, NodeManifest};

/// Mutations accepted by the configuration.
///
/// `request_id` identifies the client request so that retries can be
/// answered from an idempotency cache instead of being applied twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    CreateDataset {
        request_id: String,
        dataset: Dataset,
    },
    MoveDataset {
        request_id: String,
        dataset_id: Uuid,
        primary: String,
        expected_version: Option<u64>,
    },
    DeleteDataset {
        request_id: String,
        dataset_id: Uuid,
        expected_version: Option<u64>,
    },
    CreateContainer {
        request_id: String,
        container: Container,
    },
    DeleteContainer {
        request_id: String,
        name: String,
    },
}

impl Command {
    pub fn request_id(&self) -> &str {
        match self {
            Command::CreateDataset { request_id, .. } => request_id,
            Command::MoveDataset { request_id, .. } => request_id,
            Command::DeleteDataset { request_id, .. } => request_id,
            Command::CreateContainer { request_id, .. } => request_id,
            Command::DeleteContainer { request_id, .. } => request_id,
        }
    }

    /// Stable name of the operation, independent of its arguments.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::CreateDataset { .. } => "create_dataset",
            Command::MoveDataset { .. } => "move_dataset",
            Command::DeleteDataset { .. } => "delete_dataset",
            Command::CreateContainer { .. } => "create_container",
            Command::DeleteContainer { .. } => "delete_container",
        }
    }
}

/// Result of applying a command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Response {
    Dataset(Dataset),
    Container(Container),
}

/// A dataset together with its bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasetEntry {
    pub dataset: Dataset,
    /// Tombstone: kept until no node reports the dataset any more.
    pub deleted: bool,
    /// Configuration version at which this entry last changed.
    pub version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerEntry {
    pub container: Container,
    pub version: u64,
}

/// The desired-state document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Configuration {
    version: u64,
    datasets: BTreeMap<Uuid, DatasetEntry>,
    containers: BTreeMap<String, ContainerEntry>,
}

impl Configuration {
    /// Monotonically increasing version, bumped by every committed change.
    pub fn version(&self) -> u64 {
        self.version
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Entry for a dataset, including tombstones.
    pub fn dataset_entry(&self, id: &Uuid) -> Option<&DatasetEntry> {
        self.datasets.get(id)
    }

    /// Live (non-deleted) dataset by id.
    pub fn dataset(&self, id: &Uuid) -> Option<&Dataset> {
        self.datasets
            .get(id)
            .filter(|e| !e.deleted)
            .map(|e| &e.dataset)
    }

    /// Live datasets, ordered by id.
    pub fn datasets(&self) -> impl Iterator<Item = &Dataset> {
        self.datasets
            .values()
            .filter(|e| !e.deleted)
            .map(|e| &e.dataset)
    }

    /// All dataset entries, tombstones included.
    pub fn dataset_entries(&self) -> impl Iterator<Item = &DatasetEntry> {
        self.datasets.values()
    }

    pub fn is_tombstoned(&self, id: &Uuid) -> bool {
        self.datasets.get(id).is_some_and(|e| e.deleted)
    }

    pub fn container(&self, name: &str) -> Option<&Container> {
        self.containers.get(name).map(|e| &e.container)
    }

    pub fn containers(&self) -> impl Iterator<Item = &Container> {
        self.containers.values().map(|e| &e.container)
    }

    /// Nodes referenced as a dataset primary or container host.
    pub fn referenced_nodes(&self) -> BTreeSet<String> {
        self.datasets()
            .map(|d| d.primary.clone())
            .chain(self.containers().map(|c| c.node.clone()))
            .collect()
    }

    /// Desired resources for one node.
    pub fn manifest_for(&self, node: &str) -> NodeManifest {
        NodeManifest {
            node: node.to_string(),
            version: self.version,
            datasets: self
                .datasets()
                .filter(|d| d.primary == node)
                .cloned()
                .collect(),
            containers: self
                .containers()
                .filter(|c| c.node == node)
                .cloned()
                .collect(),
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Apply a command. On error the configuration is left untouched.
    pub fn apply(&mut self, cmd: Command) -> Result<Response, ConfigError> {
        match cmd {
            Command::CreateDataset { dataset, .. } => {
                // Tombstones still occupy their id until collected.
                if self.datasets.contains_key(&dataset.dataset_id) {
                    return Err(ConfigError::DatasetExists(dataset.dataset_id));
                }
                let version = self.bump();
                self.datasets.insert(
                    dataset.dataset_id,
                    DatasetEntry {
                        dataset: dataset.clone(),
                        deleted: false,
                        version,
                    },
                );
                Ok(Response::Dataset(dataset))
            }

            Command::MoveDataset {
                dataset_id,
                primary,
                expected_version,
                ..
            } => {
                let current = self.live_entry_version(&dataset_id)?;
                check_version(expected_version, current)?;
                self.check_unused(&dataset_id)?;
                let version = self.bump();
                let entry = self
                    .datasets
                    .get_mut(&dataset_id)
                    .ok_or(ConfigError::DatasetNotFound(dataset_id))?;
                entry.dataset.primary = primary;
                entry.version = version;
                Ok(Response::Dataset(entry.dataset.clone()))
            }

            Command::DeleteDataset {
                dataset_id,
                expected_version,
                ..
            } => {
                let current = self.live_entry_version(&dataset_id)?;
                check_version(expected_version, current)?;
                self.check_unused(&dataset_id)?;
                let version = self.bump();
                let entry = self
                    .datasets
                    .get_mut(&dataset_id)
                    .ok_or(ConfigError::DatasetNotFound(dataset_id))?;
                entry.deleted = true;
                entry.version = version;
                Ok(Response::Dataset(entry.dataset.clone()))
            }

            Command::CreateContainer { container, .. } => {
                if self.containers.contains_key(&container.name) {
                    return Err(ConfigError::ContainerExists(container.name));
                }
                for id in &container.dataset_ids {
                    let dataset = self.dataset(id).ok_or(ConfigError::DatasetNotFound(*id))?;
                    if dataset.primary != container.node {
                        return Err(ConfigError::DatasetElsewhere {
                            dataset_id: *id,
                            primary: dataset.primary.clone(),
                            node: container.node.clone(),
                        });
                    }
                }
                let version = self.bump();
                self.containers.insert(
                    container.name.clone(),
                    ContainerEntry {
                        container: container.clone(),
                        version,
                    },
                );
                Ok(Response::Container(container))
            }

            Command::DeleteContainer { name, .. } => match self.containers.remove(&name) {
                Some(entry) => {
                    self.bump();
                    Ok(Response::Container(entry.container))
                }
                None => Err(ConfigError::ContainerNotFound(name)),
            },
        }
    }

    /// Drop tombstones for which `still_observed` returns false.
    ///
    /// Returns the collected ids. The version is bumped only if something
    /// was collected.
    pub fn collect_tombstones(&mut self, still_observed: impl Fn(&Uuid) -> bool) -> Vec<Uuid> {
        let collected: Vec<Uuid> = self
            .datasets
            .values()
            .filter(|e| e.deleted && !still_observed(&e.dataset.dataset_id))
            .map(|e| e.dataset.dataset_id)
            .collect();

        if !collected.is_empty() {
            for id in &collected {
                self.datasets.remove(id);
            }
            self.bump();
        }
        collected
    }

    /// Datasets used by a container stay where they are until it is deleted.
    fn check_unused(&self, id: &Uuid) -> Result<(), ConfigError> {
        match self.containers().find(|c| c.dataset_ids.contains(id)) {
            Some(c) => Err(ConfigError::DatasetInUse {
                dataset_id: *id,
                container: c.name.clone(),
            }),
            None => Ok(()),
        }
    }

    fn live_entry_version(&self, id: &Uuid) -> Result<u64, ConfigError> {
        self.datasets
            .get(id)
            .filter(|e| !e.deleted)
            .map(|e| e.version)
            .ok_or(ConfigError::DatasetNotFound(*id))
    }

    fn bump(&mut self) -> u64 {
        self.version += 1;
        self.version
    }
}

fn check_version(expected: Option<u64>, actual: u64) -> Result<(), ConfigError> {
    match expected {
        Some(expected) if expected != actual => {
            Err(ConfigError::ConcurrentModification { expected, actual })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(config: &mut Configuration, dataset: Dataset) -> Result<Response, ConfigError> {
        config.apply(Command::CreateDataset {
            request_id: Uuid::new_v4().to_string(),
            dataset,
        })
    }

    fn move_to(
        config: &mut Configuration,
        id: Uuid,
        primary: &str,
        expected_version: Option<u64>,
    ) -> Result<Response, ConfigError> {
        config.apply(Command::MoveDataset {
            request_id: Uuid::new_v4().to_string(),
            dataset_id: id,
            primary: primary.to_string(),
            expected_version,
        })
    }

    fn delete(config: &mut Configuration, id: Uuid) -> Result<Response, ConfigError> {
        config.apply(Command::DeleteDataset {
            request_id: Uuid::new_v4().to_string(),
            dataset_id: id,
            expected_version: None,
        })
    }

    #[test]
    fn test_create_dataset() {
        let mut config = Configuration::default();
        let dataset = Dataset::new("node-1").metadata("name", "db");

        let response = create(&mut config, dataset.clone()).unwrap();
        assert_eq!(response, Response::Dataset(dataset.clone()));
        assert_eq!(config.version(), 1);
        assert_eq!(config.dataset(&dataset.dataset_id), Some(&dataset));
        assert_eq!(config.dataset_entry(&dataset.dataset_id).unwrap().version, 1);
    }

    #[test]
    fn test_create_dataset_duplicate_id() {
        let mut config = Configuration::default();
        let dataset = Dataset::new("node-1");
        create(&mut config, dataset.clone()).unwrap();

        let err = create(&mut config, Dataset::with_id("node-2", dataset.dataset_id)).unwrap_err();
        assert_eq!(err, ConfigError::DatasetExists(dataset.dataset_id));
        assert_eq!(config.version(), 1);
    }

    #[test]
    fn test_move_dataset() {
        let mut config = Configuration::default();
        let dataset = Dataset::new("node-1");
        create(&mut config, dataset.clone()).unwrap();

        let response = move_to(&mut config, dataset.dataset_id, "node-2", None).unwrap();
        let Response::Dataset(moved) = response else {
            panic!("expected dataset response");
        };
        assert_eq!(moved.primary, "node-2");
        assert_eq!(config.dataset(&dataset.dataset_id).unwrap().primary, "node-2");
        assert_eq!(config.version(), 2);
    }

    #[test]
    fn test_move_dataset_not_found() {
        let mut config = Configuration::default();
        let id = Uuid::new_v4();
        assert_eq!(
            move_to(&mut config, id, "node-2", None).unwrap_err(),
            ConfigError::DatasetNotFound(id)
        );
    }

    #[test]
    fn test_move_dataset_stale_version() {
        let mut config = Configuration::default();
        let dataset = Dataset::new("node-1");
        create(&mut config, dataset.clone()).unwrap();
        move_to(&mut config, dataset.dataset_id, "node-2", Some(1)).unwrap();

        // Second writer still holds version 1
        let err = move_to(&mut config, dataset.dataset_id, "node-3", Some(1)).unwrap_err();
        assert_eq!(
            err,
            ConfigError::ConcurrentModification {
                expected: 1,
                actual: 2
            }
        );
        assert_eq!(config.dataset(&dataset.dataset_id).unwrap().primary, "node-2");
    }

    #[test]
    fn test_unrelated_entries_do_not_conflict() {
        let mut config = Configuration::default();
        let a = Dataset::new("node-1");
        let b = Dataset::new("node-1");
        create(&mut config, a.clone()).unwrap();
        create(&mut config, b.clone()).unwrap();
        move_to(&mut config, b.dataset_id, "node-2", None).unwrap();

        // a's entry is still at version 1 even though the config moved on
        move_to(&mut config, a.dataset_id, "node-2", Some(1)).unwrap();
    }

    #[test]
    fn test_delete_dataset_leaves_tombstone() {
        let mut config = Configuration::default();
        let dataset = Dataset::new("node-1");
        create(&mut config, dataset.clone()).unwrap();

        delete(&mut config, dataset.dataset_id).unwrap();
        assert!(config.dataset(&dataset.dataset_id).is_none());
        assert!(config.is_tombstoned(&dataset.dataset_id));
        assert_eq!(config.datasets().count(), 0);

        // Deleted datasets can be neither moved, deleted again, nor re-created
        assert!(move_to(&mut config, dataset.dataset_id, "node-2", None).is_err());
        assert_eq!(
            delete(&mut config, dataset.dataset_id).unwrap_err(),
            ConfigError::DatasetNotFound(dataset.dataset_id)
        );
        assert_eq!(
            create(&mut config, dataset.clone()).unwrap_err(),
            ConfigError::DatasetExists(dataset.dataset_id)
        );
    }

    #[test]
    fn test_collect_tombstones() {
        let mut config = Configuration::default();
        let kept = Dataset::new("node-1");
        let gone = Dataset::new("node-1");
        let still_attached = Dataset::new("node-1");
        for d in [&kept, &gone, &still_attached] {
            create(&mut config, d.clone()).unwrap();
        }
        delete(&mut config, gone.dataset_id).unwrap();
        delete(&mut config, still_attached.dataset_id).unwrap();
        let before = config.version();

        let collected = config.collect_tombstones(|id| *id == still_attached.dataset_id);
        assert_eq!(collected, vec![gone.dataset_id]);
        assert!(config.dataset_entry(&gone.dataset_id).is_none());
        assert!(config.is_tombstoned(&still_attached.dataset_id));
        assert!(config.dataset(&kept.dataset_id).is_some());
        assert_eq!(config.version(), before + 1);

        // Nothing to collect: version unchanged
        assert!(config.collect_tombstones(|_| true).is_empty());
        assert_eq!(config.version(), before + 1);
    }

    #[test]
    fn test_container_lifecycle() {
        let mut config = Configuration::default();
        let dataset = Dataset::new("node-1");
        create(&mut config, dataset.clone()).unwrap();

        let container = Container::new("web", "node-1").with_dataset(dataset.dataset_id);
        config
            .apply(Command::CreateContainer {
                request_id: "r1".into(),
                container: container.clone(),
            })
            .unwrap();
        assert_eq!(config.container("web"), Some(&container));

        let err = config
            .apply(Command::CreateContainer {
                request_id: "r2".into(),
                container: Container::new("web", "node-2"),
            })
            .unwrap_err();
        assert_eq!(err, ConfigError::ContainerExists("web".into()));

        let response = config
            .apply(Command::DeleteContainer {
                request_id: "r3".into(),
                name: "web".into(),
            })
            .unwrap();
        assert_eq!(response, Response::Container(container));
        assert!(config.container("web").is_none());

        let err = config
            .apply(Command::DeleteContainer {
                request_id: "r4".into(),
                name: "web".into(),
            })
            .unwrap_err();
        assert_eq!(err, ConfigError::ContainerNotFound("web".into()));
    }

    #[test]
    fn test_container_requires_datasets() {
        let mut config = Configuration::default();
        let missing = Uuid::new_v4();
        let err = config
            .apply(Command::CreateContainer {
                request_id: "r1".into(),
                container: Container::new("web", "node-1").with_dataset(missing),
            })
            .unwrap_err();
        assert_eq!(err, ConfigError::DatasetNotFound(missing));
        assert_eq!(config.version(), 0);
    }

    #[test]
    fn test_container_must_share_node_with_datasets() {
        let mut config = Configuration::default();
        let dataset = Dataset::new("node-1");
        create(&mut config, dataset.clone()).unwrap();

        let err = config
            .apply(Command::CreateContainer {
                request_id: "r1".into(),
                container: Container::new("web", "node-2").with_dataset(dataset.dataset_id),
            })
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::DatasetElsewhere {
                dataset_id: dataset.dataset_id,
                primary: "node-1".into(),
                node: "node-2".into(),
            }
        );
        assert!(config.container("web").is_none());
        assert_eq!(config.version(), 1);
    }

    #[test]
    fn test_used_dataset_cannot_move_or_be_deleted() {
        let mut config = Configuration::default();
        let dataset = Dataset::new("node-1");
        create(&mut config, dataset.clone()).unwrap();
        config
            .apply(Command::CreateContainer {
                request_id: "r1".into(),
                container: Container::new("web", "node-1").with_dataset(dataset.dataset_id),
            })
            .unwrap();
        let in_use = ConfigError::DatasetInUse {
            dataset_id: dataset.dataset_id,
            container: "web".into(),
        };
        let before = config.version();

        let err = config
            .apply(Command::MoveDataset {
                request_id: "r2".into(),
                dataset_id: dataset.dataset_id,
                primary: "node-2".into(),
                expected_version: None,
            })
            .unwrap_err();
        assert_eq!(err, in_use);
        assert_eq!(delete(&mut config, dataset.dataset_id).unwrap_err(), in_use);
        assert_eq!(config.version(), before);
        assert_eq!(config.dataset(&dataset.dataset_id), Some(&dataset));

        config
            .apply(Command::DeleteContainer {
                request_id: "r3".into(),
                name: "web".into(),
            })
            .unwrap();
        delete(&mut config, dataset.dataset_id).unwrap();
        assert!(config.is_tombstoned(&dataset.dataset_id));
    }

    #[test]
    fn test_manifest_for_node() {
        let mut config = Configuration::default();
        let here = Dataset::new("node-1");
        let there = Dataset::new("node-2");
        let deleted = Dataset::new("node-1");
        for d in [&here, &there, &deleted] {
            create(&mut config, d.clone()).unwrap();
        }
        delete(&mut config, deleted.dataset_id).unwrap();
        config
            .apply(Command::CreateContainer {
                request_id: "r1".into(),
                container: Container::new("web", "node-1"),
            })
            .unwrap();

        let manifest = config.manifest_for("node-1");
        assert_eq!(manifest.node, "node-1");
        assert_eq!(manifest.version, config.version());
        assert_eq!(manifest.datasets, vec![here]);
        assert_eq!(manifest.containers.len(), 1);

        assert!(config.manifest_for("node-3").datasets.is_empty());
    }

    #[test]
    fn test_serde_roundtrip_keeps_tombstones() {
        let mut config = Configuration::default();
        let dataset = Dataset::new("node-1");
        create(&mut config, dataset.clone()).unwrap();
        delete(&mut config, dataset.dataset_id).unwrap();

        let json = serde_json::to_string(&config).unwrap();
        let restored: Configuration = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, config);
        assert!(restored.is_tombstoned(&dataset.dataset_id));
    }
}
