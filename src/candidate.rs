//! Candidate pool: the nodes a planning pass may disrupt.

use std::collections::BTreeMap;
use std::sync::Arc;
use log::debug;
use crate::error::ConsolidationError;
use crate::instance_type::PricingProvider;
use crate::node::NodeState;
use crate::snapshot::StateSnapshot;

#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub node_id: u32,
    pub node_pool: String,
    pub instance_type: String,
    /// Hourly price of the node.
    pub price: f64,
    /// Cost of evicting every reschedulable pod on the node.
    pub disruption_cost: f64,
    pub reschedulable_pods: Vec<u64>,
}

/// Disruption candidates of one snapshot, cheapest to disrupt first, with per node pool budgets.
#[derive(Clone, Debug)]
pub struct CandidatePool {
    snapshot: Arc<StateSnapshot>,
    candidates: Vec<Candidate>,
    budgets: BTreeMap<String, usize>,
    default_budget: usize,
}

impl CandidatePool {
    pub fn empty() -> Self {
        Self {
            snapshot: Arc::new(StateSnapshot::default()),
            candidates: Vec::new(),
            budgets: BTreeMap::new(),
            default_budget: 0,
        }
    }

    pub fn new(snapshot: Arc<StateSnapshot>, candidates: Vec<Candidate>, default_budget: usize) -> Self {
        Self {
            snapshot,
            candidates,
            budgets: BTreeMap::new(),
            default_budget,
        }
    }

    /// Collects every node eligible for disruption. Fails only if pricing data is missing.
    pub fn from_snapshot(snapshot: Arc<StateSnapshot>, pricing: &dyn PricingProvider,
                         default_budget: usize) -> Result<Self, ConsolidationError> {
        let mut candidates = Vec::new();
        for node in snapshot.nodes().values() {
            if node.state != NodeState::Working || !node.initialized || node.do_not_disrupt {
                continue;
            }
            let pods = snapshot.pods_on(node.id)?;
            if pods.iter().any(|pod| pod.do_not_disrupt) {
                debug!("node {} hosts a do-not-disrupt pod, not a candidate", node.id);
                continue;
            }
            let reschedulable: Vec<_> = pods.into_iter().filter(|pod| pod.is_reschedulable()).collect();
            candidates.push(Candidate {
                node_id: node.id,
                node_pool: node.node_pool.clone(),
                instance_type: node.instance_type.clone(),
                price: pricing.price(&node.instance_type)?,
                disruption_cost: reschedulable.iter().map(|pod| pod.disruption_cost()).sum(),
                reschedulable_pods: reschedulable.iter().map(|pod| pod.id).collect(),
            });
        }
        candidates.sort_by(|a, b| a.disruption_cost.total_cmp(&b.disruption_cost)
            .then(a.node_id.cmp(&b.node_id)));
        Ok(Self::new(snapshot, candidates, default_budget))
    }

    /// Overrides the disruption budget of one node pool.
    pub fn with_budget(mut self, node_pool: &str, budget: usize) -> Self {
        self.budgets.insert(node_pool.to_string(), budget);
        self
    }

    pub fn snapshot(&self) -> &StateSnapshot {
        &self.snapshot
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Max number of nodes of the pool that may be disrupted by one command.
    pub fn budget(&self, node_pool: &str) -> usize {
        self.budgets.get(node_pool).copied().unwrap_or(self.default_budget)
    }

    /// Whether disrupting all of `candidates` together stays within every pool budget.
    pub fn within_budget(&self, candidates: &[&Candidate]) -> bool {
        let mut disrupted = BTreeMap::<&str, usize>::new();
        for candidate in candidates {
            *disrupted.entry(candidate.node_pool.as_str()).or_default() += 1;
        }
        disrupted.into_iter().all(|(node_pool, count)| count <= self.budget(node_pool))
    }

    /// Leading candidates, in order, skipping those whose pool budget is already used up.
    pub fn budgeted_prefix(&self, max_candidates: usize) -> Vec<&Candidate> {
        let mut disrupted = BTreeMap::<&str, usize>::new();
        let mut prefix = Vec::new();
        for candidate in &self.candidates {
            if prefix.len() == max_candidates {
                break;
            }
            let count = disrupted.entry(candidate.node_pool.as_str()).or_default();
            if *count < self.budget(&candidate.node_pool) {
                *count += 1;
                prefix.push(candidate);
            }
        }
        prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance_type::{InstanceType, InstanceTypeCatalog};
    use crate::node::Node;
    use crate::pod::{Pod, PodOwner};

    fn snapshot() -> Arc<StateSnapshot> {
        let mut nodes = BTreeMap::new();
        let mut pods = BTreeMap::new();
        let mut bind = |node: &mut Node, mut pod: Pod| {
            node.add_pod(&pod);
            pod.node_id = Some(node.id);
            pods.insert(pod.id, pod);
        };

        let mut busy = Node::new(1, "default", "m5.large", 2.0, 8.0);
        bind(&mut busy, Pod::new(10, 0.5, 1.0, 1000, PodOwner::Deployment(1)));
        bind(&mut busy, Pod::new(11, 0.5, 1.0, 0, PodOwner::Deployment(1)));
        let mut daemon_only = Node::new(2, "default", "m5.large", 2.0, 8.0);
        bind(&mut daemon_only, Pod::new(12, 0.1, 0.1, 0, PodOwner::DaemonSet));
        let mut protected = Node::new(3, "default", "m5.large", 2.0, 8.0);
        let mut pinned = Pod::new(13, 0.5, 1.0, 0, PodOwner::None);
        pinned.do_not_disrupt = true;
        bind(&mut protected, pinned);
        let mut annotated = Node::new(4, "default", "m5.large", 2.0, 8.0);
        annotated.do_not_disrupt = true;
        let mut deleting = Node::new(5, "default", "m5.large", 2.0, 8.0);
        deleting.state = NodeState::MarkedForDeletion;
        let mut unready = Node::new(6, "default", "m5.large", 2.0, 8.0);
        unready.initialized = false;
        let mut single = Node::new(7, "batch", "m5.large", 2.0, 8.0);
        bind(&mut single, Pod::new(14, 0.5, 1.0, 0, PodOwner::Deployment(2)));

        for node in [busy, daemon_only, protected, annotated, deleting, unready, single] {
            nodes.insert(node.id, node);
        }
        Arc::new(StateSnapshot::new(1, nodes, pods))
    }

    fn catalog() -> InstanceTypeCatalog {
        InstanceTypeCatalog::new(vec![InstanceType::new("m5.large", 2.0, 8.0, 0.096)])
    }

    #[test]
    fn test_eligibility_and_order() {
        let pool = CandidatePool::from_snapshot(snapshot(), &catalog(), 10).unwrap();
        let ids: Vec<_> = pool.candidates().iter().map(|c| c.node_id).collect();
        assert_eq!(ids, vec![2, 7, 1]);
        assert!(pool.candidates()[0].reschedulable_pods.is_empty());
        assert_eq!(pool.candidates()[2].reschedulable_pods, vec![10, 11]);
        assert_eq!(pool.candidates()[2].price, 0.096);
    }

    #[test]
    fn test_missing_price_fails() {
        let result = CandidatePool::from_snapshot(snapshot(), &InstanceTypeCatalog::default(), 10);
        assert_eq!(result.unwrap_err(), ConsolidationError::Pricing { instance_type: "m5.large".to_string() });
    }

    #[test]
    fn test_budgets() {
        let pool = CandidatePool::from_snapshot(snapshot(), &catalog(), 10)
            .unwrap()
            .with_budget("default", 1);
        let prefix: Vec<_> = pool.budgeted_prefix(10).iter().map(|c| c.node_id).collect();
        assert_eq!(prefix, vec![2, 7]);
        assert_eq!(pool.budgeted_prefix(1).len(), 1);

        let candidates: Vec<_> = pool.candidates().iter().collect();
        assert!(pool.within_budget(&candidates[..2]));
        assert!(!pool.within_budget(&candidates));
        assert!(CandidatePool::empty().is_empty());
    }
}
