//! Representation of the k8s pod

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use serde::Serialize;

/// Pod status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PodStatus {
    Pending,
    Running,
}

impl Display for PodStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            PodStatus::Pending => write!(f, "pending"),
            PodStatus::Running => write!(f, "running"),
        }
    }
}

/// Controller that owns the pod.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PodOwner {
    Deployment(u64),
    /// Daemon pods live and die with their node, they are never rescheduled.
    DaemonSet,
    None,
}

#[derive(Clone, Debug, Serialize)]
pub struct Pod {
    pub id: u64,
    pub requested_cpu: f32,
    pub requested_memory: f64,
    pub priority_weight: u64,
    pub owner: PodOwner,
    /// Pod carries the do-not-disrupt annotation; its node is not a consolidation candidate.
    pub do_not_disrupt: bool,
    /// Restricts placement to nodes of the given node pool.
    pub node_pool_selector: Option<String>,

    pub status: PodStatus,
    pub node_id: Option<u32>,
}

impl Pod {
    pub fn new(id: u64, requested_cpu: f32, requested_memory: f64, priority_weight: u64, owner: PodOwner) -> Self {
        Self {
            id,
            requested_cpu,
            requested_memory,
            priority_weight,
            owner,
            do_not_disrupt: false,
            node_pool_selector: None,
            status: PodStatus::Pending,
            node_id: None,
        }
    }

    /// Whether the pod must find a new home when its node goes away.
    pub fn is_reschedulable(&self) -> bool {
        self.owner != PodOwner::DaemonSet
    }

    /// Cost of evicting this pod, higher priority pods are more expensive to move.
    pub fn disruption_cost(&self) -> f64 {
        1.0 + (self.priority_weight as f64) / 1000.0
    }

    pub fn tolerates_node_pool(&self, node_pool: &str) -> bool {
        match &self.node_pool_selector {
            Some(selector) => selector == node_pool,
            None => true,
        }
    }
}

/// Comparision operators for prioritizing pods
impl Eq for Pod {}

impl PartialEq for Pod {
    fn eq(&self, other: &Self) -> bool {
        self.priority_weight == other.priority_weight
    }
}

impl Ord for Pod {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority_weight.cmp(&other.priority_weight)
    }
}

impl PartialOrd for Pod {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
