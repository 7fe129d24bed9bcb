//! Representation of the k8s node as seen by consolidation

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use serde::Serialize;
use crate::pod::Pod;

/// Node lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum NodeState {
    Working,
    /// The executor has started draining the node.
    MarkedForDeletion,
}

impl Display for NodeState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            NodeState::Working => write!(f, "working"),
            NodeState::MarkedForDeletion => write!(f, "marked for deletion"),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Node {
    pub id: u32,
    pub node_pool: String,
    pub instance_type: String,
    pub cpu_total: f32,
    pub memory_total: f64,
    pub cpu_allocated: f32,
    pub memory_allocated: f64,
    pub state: NodeState,
    /// Node has registered and is ready to take pods.
    pub initialized: bool,
    /// Node carries the do-not-disrupt annotation.
    pub do_not_disrupt: bool,
    pods: BTreeSet<u64>,
}

impl Node {
    pub fn new(id: u32, node_pool: &str, instance_type: &str, cpu_total: f32, memory_total: f64) -> Self {
        Self {
            id,
            node_pool: node_pool.to_string(),
            instance_type: instance_type.to_string(),
            cpu_total,
            memory_total,
            cpu_allocated: 0.0,
            memory_allocated: 0.0,
            state: NodeState::Working,
            initialized: true,
            do_not_disrupt: false,
            pods: BTreeSet::new(),
        }
    }

    pub fn get_free_cpu(&self) -> f32 {
        self.cpu_total - self.cpu_allocated
    }

    pub fn get_free_memory(&self) -> f64 {
        self.memory_total - self.memory_allocated
    }

    pub fn get_cpu_utilization(&self) -> f64 {
        (self.cpu_allocated as f64) / (self.cpu_total as f64)
    }

    pub fn get_memory_utilization(&self) -> f64 {
        self.memory_allocated / self.memory_total
    }

    pub fn can_place_pod(&self, requested_cpu: f32, requested_memory: f64) -> bool {
        self.state == NodeState::Working
            && self.get_free_cpu() >= requested_cpu
            && self.get_free_memory() >= requested_memory
    }

    pub fn add_pod(&mut self, pod: &Pod) -> bool {
        if !self.can_place_pod(pod.requested_cpu, pod.requested_memory) {
            return false;
        }
        self.cpu_allocated += pod.requested_cpu;
        self.memory_allocated += pod.requested_memory;
        self.pods.insert(pod.id);
        true
    }

    pub fn remove_pod(&mut self, pod: &Pod) {
        if self.pods.remove(&pod.id) {
            self.cpu_allocated = (self.cpu_allocated - pod.requested_cpu).max(0.0);
            self.memory_allocated = (self.memory_allocated - pod.requested_memory).max(0.0);
        }
    }

    pub fn pods(&self) -> impl Iterator<Item = u64> + '_ {
        self.pods.iter().copied()
    }

    pub fn pod_count(&self) -> usize {
        self.pods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }
}
