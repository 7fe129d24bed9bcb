//! Pod placement algorithms used to simulate rescheduling.

use std::collections::BTreeMap;
use dyn_clone::{clone_trait_object, DynClone};
use serde::{Deserialize, Serialize};
use crate::node::Node;
use crate::pod::Pod;

pub trait PlacementAlgorithm: DynClone + Send + Sync {
    /// Filter nodes by need pod, returns node_id for filtered nodes.
    fn filter(&self, pod: &Pod, nodes: &BTreeMap<u32, Node>) -> Vec<u32> {
        nodes.iter()
            .filter(|(_, node)| node.can_place_pod(pod.requested_cpu, pod.requested_memory)
                && pod.tolerates_node_pool(&node.node_pool))
            .map(|(node_id, _)| *node_id)
            .collect()
    }

    /// Score nodes by need pod, returns scores for nodes from filtered_node_ids.
    fn score(&self, pod: &Pod, nodes: &BTreeMap<u32, Node>, filtered_node_ids: &[u32]) -> Vec<f64>;

    /// Picks the best scored node, the lowest node id wins ties.
    fn select_node(&self, pod: &Pod, nodes: &BTreeMap<u32, Node>) -> Option<u32> {
        let filtered_nodes = self.filter(pod, nodes);
        if filtered_nodes.is_empty() {
            return None;
        }
        let node_scores = self.score(pod, nodes, &filtered_nodes);
        let mut max_score_ind = 0;
        for i in 0..filtered_nodes.len() {
            if node_scores[i] > node_scores[max_score_ind] {
                max_score_ind = i;
            }
        }
        Some(filtered_nodes[max_score_ind])
    }
}

clone_trait_object!(PlacementAlgorithm);

/// Placement algorithm selector used in configs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementKind {
    #[default]
    MostRequested,
    LeastRequested,
}

impl PlacementKind {
    pub fn build(&self) -> Box<dyn PlacementAlgorithm> {
        match self {
            PlacementKind::MostRequested => Box::new(MostRequestedPlacement::new()),
            PlacementKind::LeastRequested => Box::new(LeastRequestedPlacement::new()),
        }
    }
}

fn utilization_after(node: &Node, pod: &Pod) -> f64 {
    let cpu_utilization = ((node.cpu_allocated + pod.requested_cpu) as f64) / (node.cpu_total as f64);
    let memory_utilization = (node.memory_allocated + pod.requested_memory) / node.memory_total;
    (cpu_utilization + memory_utilization) / 2.0
}

/// Packs pods onto the fullest nodes, which leaves whole nodes free for removal.
#[derive(Clone, Default)]
pub struct MostRequestedPlacement;

impl MostRequestedPlacement {
    pub fn new() -> Self {
        Default::default()
    }
}

impl PlacementAlgorithm for MostRequestedPlacement {
    fn score(&self, pod: &Pod, nodes: &BTreeMap<u32, Node>, filtered_node_ids: &[u32]) -> Vec<f64> {
        filtered_node_ids.iter()
            .map(|node_id| nodes.get(node_id).map_or(0.0, |node| 10.0 * utilization_after(node, pod)))
            .collect()
    }
}

/// Spreads pods onto the emptiest nodes.
#[derive(Clone, Default)]
pub struct LeastRequestedPlacement;

impl LeastRequestedPlacement {
    pub fn new() -> Self {
        Default::default()
    }
}

impl PlacementAlgorithm for LeastRequestedPlacement {
    fn score(&self, pod: &Pod, nodes: &BTreeMap<u32, Node>, filtered_node_ids: &[u32]) -> Vec<f64> {
        filtered_node_ids.iter()
            .map(|node_id| nodes.get(node_id).map_or(0.0, |node| 10.0 * (1.0 - utilization_after(node, pod))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pod::PodOwner;

    fn nodes() -> BTreeMap<u32, Node> {
        let mut busy = Node::new(1, "default", "m5.xlarge", 4.0, 16.0);
        busy.add_pod(&Pod::new(100, 2.0, 8.0, 100, PodOwner::None));
        let idle = Node::new(2, "default", "m5.xlarge", 4.0, 16.0);
        let other_pool = Node::new(3, "gpu", "p3.2xlarge", 8.0, 61.0);
        BTreeMap::from([(1, busy), (2, idle), (3, other_pool)])
    }

    #[test]
    fn test_most_requested_prefers_fullest_node() {
        let mut pod = Pod::new(1, 1.0, 2.0, 100, PodOwner::None);
        pod.node_pool_selector = Some("default".to_string());
        assert_eq!(MostRequestedPlacement::new().select_node(&pod, &nodes()), Some(1));
    }

    #[test]
    fn test_least_requested_prefers_emptiest_node() {
        let mut pod = Pod::new(1, 1.0, 2.0, 100, PodOwner::None);
        pod.node_pool_selector = Some("default".to_string());
        assert_eq!(LeastRequestedPlacement::new().select_node(&pod, &nodes()), Some(2));
    }

    #[test]
    fn test_no_fitting_node() {
        let pod = Pod::new(1, 16.0, 2.0, 100, PodOwner::None);
        assert_eq!(PlacementKind::MostRequested.build().select_node(&pod, &nodes()), None);
    }
}
