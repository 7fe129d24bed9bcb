//! Immutable, versioned view of the cluster topology.

use std::collections::BTreeMap;
use crate::error::ConsolidationError;
use crate::node::Node;
use crate::pod::Pod;

/// A snapshot is never edited: every cluster mutation produces a new generation.
#[derive(Clone, Debug, Default)]
pub struct StateSnapshot {
    generation: u64,
    nodes: BTreeMap<u32, Node>,
    pods: BTreeMap<u64, Pod>,
}

impl StateSnapshot {
    pub fn new(generation: u64, nodes: BTreeMap<u32, Node>, pods: BTreeMap<u64, Pod>) -> Self {
        Self { generation, nodes, pods }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn nodes(&self) -> &BTreeMap<u32, Node> {
        &self.nodes
    }

    pub fn node(&self, node_id: u32) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub fn pod(&self, pod_id: u64) -> Option<&Pod> {
        self.pods.get(&pod_id)
    }

    pub fn pods(&self) -> impl Iterator<Item = &Pod> {
        self.pods.values()
    }

    /// Pods bound to the node.
    pub fn pods_on(&self, node_id: u32) -> Result<Vec<&Pod>, ConsolidationError> {
        let node = self.node(node_id).ok_or(ConsolidationError::UnknownNode(node_id))?;
        node.pods()
            .map(|pod_id| self.pod(pod_id).ok_or(ConsolidationError::UnknownPod(pod_id)))
            .collect()
    }

    pub fn pending_pods(&self) -> impl Iterator<Item = &Pod> {
        self.pods.values().filter(|pod| pod.node_id.is_none())
    }
}
