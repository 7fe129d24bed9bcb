//! Cluster state: the single owner of the mutable topology.
//!
//! Every node or pod mutation bumps the generation and marks the staleness tracker
//! unconsolidated, whether or not it matters to consolidation.

use std::collections::BTreeMap;
use std::sync::Arc;
use dslab_core::{cast, Event, EventHandler};
use log::{debug, warn};
use crate::error::ConsolidationError;
use crate::events::cluster::{NodeCreated, NodeDeleted, NodeUpdated, PodDeleted, PodSubmitted};
use crate::node::{Node, NodeState};
use crate::placement::PlacementAlgorithm;
use crate::pod::{Pod, PodStatus};
use crate::snapshot::StateSnapshot;
use crate::staleness::ConsolidationState;

pub struct ClusterState {
    nodes: BTreeMap<u32, Node>,
    pods: BTreeMap<u64, Pod>,
    generation: u64,
    snapshot: Option<Arc<StateSnapshot>>,

    tracker: Arc<dyn ConsolidationState>,
    placement: Box<dyn PlacementAlgorithm>,

    node_counter: u32,
    pod_counter: u64,
}

impl ClusterState {
    pub fn new(tracker: Arc<dyn ConsolidationState>, placement: Box<dyn PlacementAlgorithm>) -> Self {
        Self {
            nodes: BTreeMap::default(),
            pods: BTreeMap::default(),
            generation: 0,
            snapshot: None,
            tracker,
            placement,
            node_counter: 0,
            pod_counter: 0,
        }
    }

    pub fn generate_node_id(&mut self) -> u32 {
        self.node_counter += 1;
        self.node_counter
    }

    pub fn generate_pod_id(&mut self) -> u64 {
        self.pod_counter += 1;
        self.pod_counter
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn tracker(&self) -> &Arc<dyn ConsolidationState> {
        &self.tracker
    }

    /// Read-only view of the current generation. Cached until the next mutation.
    pub fn snapshot(&mut self) -> Arc<StateSnapshot> {
        if let Some(snapshot) = &self.snapshot {
            return snapshot.clone();
        }
        let snapshot = Arc::new(StateSnapshot::new(self.generation, self.nodes.clone(), self.pods.clone()));
        self.snapshot = Some(snapshot.clone());
        snapshot
    }

    pub fn node(&self, node_id: u32) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub fn nodes(&self) -> &BTreeMap<u32, Node> {
        &self.nodes
    }

    pub fn pod(&self, pod_id: u64) -> Option<&Pod> {
        self.pods.get(&pod_id)
    }

    pub fn pending_pods(&self) -> usize {
        self.pods.values().filter(|pod| pod.status == PodStatus::Pending).count()
    }

    fn touch(&mut self) {
        self.generation += 1;
        self.snapshot = None;
        self.tracker.mark_unconsolidated();
    }

    /// Add new node to the cluster, pending pods get a chance to land on it
    pub fn add_node(&mut self, node: Node) -> u32 {
        let node_id = node.id;
        self.node_counter = self.node_counter.max(node_id);
        self.nodes.insert(node_id, node);
        self.touch();
        self.bind_pending_pods();
        node_id
    }

    /// Applies new capacity, readiness and annotations to an existing node.
    /// Bound pods stay where they are, even if the node is now overcommitted.
    pub fn update_node(&mut self, update: Node) -> Result<(), ConsolidationError> {
        let node = self.nodes.get_mut(&update.id).ok_or(ConsolidationError::UnknownNode(update.id))?;
        node.cpu_total = update.cpu_total;
        node.memory_total = update.memory_total;
        node.initialized = update.initialized;
        node.do_not_disrupt = update.do_not_disrupt;
        self.touch();
        self.bind_pending_pods();
        Ok(())
    }

    /// Marks all of the nodes for deletion, or none of them if any is unknown.
    pub fn mark_nodes_for_deletion(&mut self, node_ids: &[u32]) -> Result<(), ConsolidationError> {
        if let Some(missing) = node_ids.iter().find(|node_id| !self.nodes.contains_key(node_id)) {
            return Err(ConsolidationError::UnknownNode(*missing));
        }
        for node_id in node_ids {
            if let Some(node) = self.nodes.get_mut(node_id) {
                node.state = NodeState::MarkedForDeletion;
            }
        }
        self.touch();
        Ok(())
    }

    /// Remove node from the cluster. Its reschedulable pods become pending, daemon pods are gone.
    pub fn remove_node(&mut self, node_id: u32) -> Result<Vec<u64>, ConsolidationError> {
        let node = self.nodes.remove(&node_id).ok_or(ConsolidationError::UnknownNode(node_id))?;
        let mut evicted = Vec::new();
        for pod_id in node.pods() {
            let reschedulable = self.pods.get(&pod_id).map_or(false, |pod| pod.is_reschedulable());
            if !reschedulable {
                self.pods.remove(&pod_id);
                continue;
            }
            if let Some(pod) = self.pods.get_mut(&pod_id) {
                pod.node_id = None;
                pod.status = PodStatus::Pending;
                evicted.push(pod_id);
            }
        }
        self.touch();
        self.bind_pending_pods();
        Ok(evicted)
    }

    /// Submits a pod, binding it right away when some node fits it
    pub fn submit_pod(&mut self, mut pod: Pod) -> u64 {
        let pod_id = pod.id;
        self.pod_counter = self.pod_counter.max(pod_id);
        pod.status = PodStatus::Pending;
        pod.node_id = None;
        self.pods.insert(pod_id, pod);
        self.touch();
        self.bind_pending_pods();
        pod_id
    }

    pub fn delete_pod(&mut self, pod_id: u64) -> Result<(), ConsolidationError> {
        let pod = self.pods.remove(&pod_id).ok_or(ConsolidationError::UnknownPod(pod_id))?;
        if let Some(node) = pod.node_id.and_then(|node_id| self.nodes.get_mut(&node_id)) {
            node.remove_pod(&pod);
        }
        self.touch();
        self.bind_pending_pods();
        Ok(())
    }

    /// Moves a pod onto the given node. Returns false if it doesn't fit there.
    pub fn move_pod(&mut self, pod_id: u64, node_id: u32) -> Result<bool, ConsolidationError> {
        let pod = self.pods.get(&pod_id).ok_or(ConsolidationError::UnknownPod(pod_id))?.clone();
        if pod.node_id == Some(node_id) {
            return Ok(true);
        }
        let target = self.nodes.get_mut(&node_id).ok_or(ConsolidationError::UnknownNode(node_id))?;
        if !target.add_pod(&pod) {
            return Ok(false);
        }
        if let Some(source) = pod.node_id.and_then(|source_id| self.nodes.get_mut(&source_id)) {
            source.remove_pod(&pod);
        }
        if let Some(pod) = self.pods.get_mut(&pod_id) {
            pod.node_id = Some(node_id);
            pod.status = PodStatus::Running;
        }
        self.touch();
        Ok(true)
    }

    fn bind_pending_pods(&mut self) {
        let mut pending: Vec<Pod> = self.pods.values()
            .filter(|pod| pod.status == PodStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.cmp(a).then(a.id.cmp(&b.id)));

        let mut bound = false;
        for pod in pending {
            let Some(node_id) = self.placement.select_node(&pod, &self.nodes) else {
                continue;
            };
            let placed = self.nodes.get_mut(&node_id).map_or(false, |node| node.add_pod(&pod));
            if let (true, Some(pod)) = (placed, self.pods.get_mut(&pod.id)) {
                pod.node_id = Some(node_id);
                pod.status = PodStatus::Running;
                debug!("pod {} bound to node {}", pod.id, node_id);
                bound = true;
            }
        }
        if bound {
            self.touch();
        }
    }
}

impl EventHandler for ClusterState {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            NodeCreated { node } => {
                self.add_node(node);
            }
            NodeUpdated { node } => {
                if let Err(e) = self.update_node(node) {
                    warn!("can't update node: {}", e);
                }
            }
            NodeDeleted { node_id } => {
                if let Err(e) = self.remove_node(node_id) {
                    warn!("can't delete node: {}", e);
                }
            }
            PodSubmitted { pod } => {
                self.submit_pod(pod);
            }
            PodDeleted { pod_id } => {
                if let Err(e) = self.delete_pod(pod_id) {
                    warn!("can't delete pod: {}", e);
                }
            }
        })
    }
}
