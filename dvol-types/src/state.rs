//! Observed state aggregated from node reports.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::model::{
    ContainerState, DatasetState, NodeInfo, NodeStateReport, ObservedContainer, ObservedDataset,
};

/// What one node last reported.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeState {
    pub epoch: u64,
    pub reported_at: Option<String>,
    pub datasets: BTreeMap<Uuid, ObservedDataset>,
    pub containers: BTreeMap<String, ObservedContainer>,
}

/// The observed-state document, keyed by node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObservedState {
    nodes: BTreeMap<String, NodeState>,
}

impl ObservedState {
    /// Merge a full node snapshot.
    ///
    /// Last writer wins per node, ordered by the agent's own epoch: a report
    /// whose epoch is not newer than the stored one is ignored and `false`
    /// is returned.
    pub fn merge(&mut self, node: &str, report: NodeStateReport, reported_at: String) -> bool {
        if let Some(current) = self.nodes.get(node)
            && report.epoch <= current.epoch
        {
            return false;
        }

        self.nodes.insert(
            node.to_string(),
            NodeState {
                epoch: report.epoch,
                reported_at: Some(reported_at),
                datasets: report
                    .datasets
                    .into_iter()
                    .map(|d| (d.dataset_id, d))
                    .collect(),
                containers: report
                    .containers
                    .into_iter()
                    .map(|c| (c.name.clone(), c))
                    .collect(),
            },
        );
        true
    }

    pub fn node(&self, node: &str) -> Option<&NodeState> {
        self.nodes.get(node)
    }

    /// Mutable access for in-process convergence (simulators); creates the
    /// node entry on first use.
    pub fn node_mut(&mut self, node: &str) -> &mut NodeState {
        self.nodes.entry(node.to_string()).or_default()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Whether any node still reports the dataset.
    pub fn holds_dataset(&self, id: &Uuid) -> bool {
        self.nodes.values().any(|n| n.datasets.contains_key(id))
    }

    /// Remove a dataset from every node, returning how many copies were dropped.
    pub fn remove_dataset(&mut self, id: &Uuid) -> usize {
        self.nodes
            .values_mut()
            .filter_map(|n| n.datasets.remove(id))
            .count()
    }

    pub fn remove_container(&mut self, name: &str) -> usize {
        self.nodes
            .values_mut()
            .filter_map(|n| n.containers.remove(name))
            .count()
    }

    /// Flat dataset projection ordered by dataset id, then node.
    ///
    /// A dataset reported by two nodes (mid-move) appears twice.
    pub fn dataset_states(&self) -> Vec<DatasetState> {
        let mut states: Vec<DatasetState> = self
            .nodes
            .iter()
            .flat_map(|(node, state)| {
                state.datasets.values().map(move |d| DatasetState {
                    dataset_id: d.dataset_id,
                    primary: node.clone(),
                    status: d.status,
                    maximum_size: d.maximum_size,
                    path: d.path.clone(),
                })
            })
            .collect();
        states.sort_by(|a, b| {
            a.dataset_id
                .cmp(&b.dataset_id)
                .then_with(|| a.primary.cmp(&b.primary))
        });
        states
    }

    /// Flat container projection ordered by name, then node.
    pub fn container_states(&self) -> Vec<ContainerState> {
        let mut states: Vec<ContainerState> = self
            .nodes
            .iter()
            .flat_map(|(node, state)| {
                state.containers.values().map(move |c| ContainerState {
                    name: c.name.clone(),
                    node: node.clone(),
                    dataset_ids: c.dataset_ids.clone(),
                    running: c.running,
                })
            })
            .collect();
        states.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.node.cmp(&b.node)));
        states
    }

    pub fn node_info(&self, node: &str) -> NodeInfo {
        match self.nodes.get(node) {
            Some(state) => NodeInfo {
                id: node.to_string(),
                epoch: state.epoch,
                reported_at: state.reported_at.clone(),
            },
            None => NodeInfo {
                id: node.to_string(),
                epoch: 0,
                reported_at: None,
            },
        }
    }
}
