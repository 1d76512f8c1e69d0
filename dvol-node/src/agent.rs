//! Node agent - pulls the node manifest from the control service,
//! reconciles local resources, and reports a full snapshot back.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dvol_types::{DatasetStatus, NodeManifest, NodeStateReport, ObservedDataset};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::LocalBackend;
use crate::control::ControlClient;
use crate::error::Result;
use crate::reconciler::{ContainerReconciler, DatasetReconciler, Reconciler};

const DATASETS: &str = "dataset";
const CONTAINERS: &str = "container";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// This node's identifier as used in dataset primaries.
    pub node: String,
    /// Control service root, e.g. `http://10.0.0.1:4523`.
    pub control_endpoint: String,
    /// Upper bound between two convergence passes.
    pub poll_interval: Duration,
}

/// Convergence agent for one node.
pub struct NodeAgent {
    control: ControlClient,
    poll_interval: Duration,
    backend: Arc<dyn LocalBackend>,
    /// Last reporting epoch; strictly increasing across restarts.
    epoch: u64,
    /// Configuration version of the last applied manifest.
    applied_version: Option<u64>,
    /// Tracks known resource IDs per type for pruning.
    known_ids: HashMap<&'static str, HashSet<String>>,
    dataset_reconciler: DatasetReconciler,
    container_reconciler: ContainerReconciler,
}

impl NodeAgent {
    pub fn new(config: AgentConfig, backend: Arc<dyn LocalBackend>) -> Self {
        Self {
            control: ControlClient::new(config.control_endpoint, config.node),
            poll_interval: config.poll_interval,
            dataset_reconciler: DatasetReconciler::new(backend.clone()),
            container_reconciler: ContainerReconciler::new(backend.clone()),
            backend,
            epoch: 0,
            applied_version: None,
            known_ids: HashMap::new(),
        }
    }

    pub fn node(&self) -> &str {
        self.control.node()
    }

    pub fn applied_version(&self) -> Option<u64> {
        self.applied_version
    }

    /// Next reporting epoch. Seeded from the wall clock so that a restarted
    /// agent is not shadowed by reports from its previous run.
    fn next_epoch(&mut self) -> u64 {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        self.epoch = now.max(self.epoch + 1);
        self.epoch
    }

    /// Initialize known_ids from the backend (init from reality).
    pub async fn init_from_reality(&mut self) {
        match self.backend.list_datasets().await {
            Ok(datasets) => {
                let ids: HashSet<String> =
                    datasets.iter().map(|d| d.dataset_id.to_string()).collect();
                info!("Init from reality: {} datasets", ids.len());
                self.known_ids.insert(DATASETS, ids);
            }
            Err(e) => {
                warn!("Failed to list local datasets: {}", e);
                self.known_ids.entry(DATASETS).or_default();
            }
        }

        match self.backend.list_containers().await {
            Ok(containers) => {
                let ids: HashSet<String> = containers.iter().map(|c| c.name.clone()).collect();
                info!("Init from reality: {} containers", ids.len());
                self.known_ids.insert(CONTAINERS, ids);
            }
            Err(e) => {
                warn!("Failed to list local containers: {}", e);
                self.known_ids.entry(CONTAINERS).or_default();
            }
        }
    }

    /// One convergence pass: pull, reconcile, report.
    ///
    /// Returns whether the control service accepted the report.
    pub async fn run_once(&mut self) -> Result<bool> {
        let manifest = self.control.manifest(None, self.poll_interval).await?;
        self.converge(manifest).await
    }

    /// Run until `shutdown` resolves, long-polling for configuration changes.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.init_from_reality().await;
        tokio::pin!(shutdown);

        info!("Agent for node {} started", self.node());
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Agent for node {} stopping", self.node());
                    return Ok(());
                }
                result = self.cycle() => {
                    if let Err(e) = result {
                        error!("Convergence pass failed: {}", e);
                        tokio::select! {
                            _ = &mut shutdown => return Ok(()),
                            _ = tokio::time::sleep(self.poll_interval) => {}
                        }
                    }
                }
            }
        }
    }

    async fn cycle(&mut self) -> Result<()> {
        let manifest = self
            .control
            .manifest(self.applied_version, self.poll_interval)
            .await?;
        self.converge(manifest).await?;
        Ok(())
    }

    async fn converge(&mut self, manifest: NodeManifest) -> Result<bool> {
        let version = manifest.version;
        let report = self.apply_manifest(manifest).await;
        let epoch = report.epoch;

        let accepted = self.control.report(&report).await?;
        if accepted {
            self.applied_version = Some(version);
            debug!("Reported epoch {} for configuration {}", epoch, version);
        } else {
            warn!("Control service ignored report with epoch {}", epoch);
        }
        Ok(accepted)
    }

    /// Reconcile all resources in dependency order and prune absent ones.
    ///
    /// Resources that fail to prune stay known and are reported as
    /// detaching so that the control service keeps their tombstones.
    pub async fn apply_manifest(&mut self, manifest: NodeManifest) -> NodeStateReport {
        info!(
            "Applying manifest version {} (datasets={}, containers={})",
            manifest.version,
            manifest.datasets.len(),
            manifest.containers.len(),
        );

        let mut report = NodeStateReport {
            epoch: self.next_epoch(),
            datasets: vec![],
            containers: vec![],
        };

        // 1. Datasets
        {
            let desired: HashSet<String> = manifest
                .datasets
                .iter()
                .map(|d| d.dataset_id.to_string())
                .collect();

            for spec in &manifest.datasets {
                let id = spec.dataset_id.to_string();
                match self.dataset_reconciler.reconcile(&id, spec).await {
                    Ok(s) => report.datasets.push(s),
                    Err(e) => error!("Dataset reconciliation failed for {}: {:#}", id, e),
                }
            }

            let known = self.known_ids.entry(DATASETS).or_default();
            let mut retained = desired;
            for id in known.difference(&retained).cloned().collect::<Vec<_>>() {
                info!("Pruning dataset {}", id);
                if let Err(e) = self.dataset_reconciler.finalize(&id).await {
                    error!("Failed to prune dataset {}: {:#}", id, e);
                    if let Ok(dataset_id) = Uuid::parse_str(&id) {
                        report.datasets.push(ObservedDataset {
                            dataset_id,
                            status: DatasetStatus::Detaching,
                            maximum_size: None,
                            path: None,
                        });
                    }
                    retained.insert(id);
                }
            }
            *known = retained;
        }

        // 2. Containers
        {
            let desired: HashSet<String> =
                manifest.containers.iter().map(|c| c.name.clone()).collect();

            for spec in &manifest.containers {
                match self.container_reconciler.reconcile(&spec.name, spec).await {
                    Ok(s) => report.containers.push(s),
                    Err(e) => error!("Container reconciliation failed for {}: {:#}", spec.name, e),
                }
            }

            let known = self.known_ids.entry(CONTAINERS).or_default();
            let mut retained = desired;
            for id in known.difference(&retained).cloned().collect::<Vec<_>>() {
                info!("Pruning container {}", id);
                if let Err(e) = self.container_reconciler.finalize(&id).await {
                    error!("Failed to prune container {}: {:#}", id, e);
                    retained.insert(id);
                }
            }
            *known = retained;
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use dvol_types::{Container, Dataset};

    fn agent(backend: Arc<MemoryBackend>) -> NodeAgent {
        NodeAgent::new(
            AgentConfig {
                node: "node-a".to_string(),
                control_endpoint: "http://127.0.0.1:9".to_string(),
                poll_interval: Duration::from_millis(100),
            },
            backend,
        )
    }

    fn manifest(version: u64, datasets: Vec<Dataset>, containers: Vec<Container>) -> NodeManifest {
        NodeManifest {
            node: "node-a".to_string(),
            version,
            datasets,
            containers,
        }
    }

    #[tokio::test]
    async fn test_apply_manifest_attaches_and_prunes() {
        let backend = Arc::new(MemoryBackend::new());
        let mut agent = agent(backend.clone());
        let keep = Dataset::new("node-a");
        let drop = Dataset::new("node-a");

        let report = agent
            .apply_manifest(manifest(
                2,
                vec![keep.clone(), drop.clone()],
                vec![Container::new("web", "node-a").with_dataset(keep.dataset_id)],
            ))
            .await;
        assert_eq!(report.datasets.len(), 2);
        assert_eq!(report.containers.len(), 1);

        let report = agent
            .apply_manifest(manifest(3, vec![keep.clone()], vec![]))
            .await;
        assert_eq!(report.datasets.len(), 1);
        assert_eq!(report.datasets[0].dataset_id, keep.dataset_id);
        assert!(report.containers.is_empty());

        let local = backend.list_datasets().await.unwrap();
        assert_eq!(local.len(), 1);
        assert!(backend.list_containers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_init_from_reality_prunes_leftovers() {
        let backend = Arc::new(MemoryBackend::new());
        let leftover = Uuid::new_v4();
        backend.attach_dataset(leftover, None).await.unwrap();

        let mut agent = agent(backend.clone());
        agent.init_from_reality().await;
        let report = agent.apply_manifest(manifest(1, vec![], vec![])).await;

        assert!(report.datasets.is_empty());
        assert!(backend.get_dataset(leftover).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_epochs_strictly_increase() {
        let mut agent = agent(Arc::new(MemoryBackend::new()));
        let first = agent.apply_manifest(manifest(1, vec![], vec![])).await.epoch;
        let second = agent.apply_manifest(manifest(1, vec![], vec![])).await.epoch;
        assert!(second > first);
        assert!(first > 0);
    }
}
