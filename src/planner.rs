//! Command planning: the trait implemented by each consolidation mode and the rescheduling
//! evaluation they share.

use std::collections::{BTreeMap, BTreeSet};
use crate::candidate::{Candidate, CandidatePool};
use crate::command::{Command, PodMove, ReplacementNode};
use crate::consolidation::ConsolidationMode;
use crate::context::PlanningContext;
use crate::error::ConsolidationError;
use crate::instance_type::PricingProvider;
use crate::node::Node;
use crate::placement::PlacementAlgorithm;
use crate::pod::Pod;
use crate::snapshot::StateSnapshot;

pub trait CommandPlanner: Send + Sync {
    /// Produces disruption commands for the pool. Read-only against the pool's snapshot.
    ///
    /// An empty result means nothing worth disrupting. Errors are reserved for cancellation
    /// and unrecoverable data failures.
    fn compute_commands(&self, ctx: &PlanningContext, pool: &CandidatePool)
        -> Result<Vec<Command>, ConsolidationError>;
}

/// Outcome of moving the pods of a set of candidates onto the rest of the cluster.
#[derive(Debug, Default)]
pub struct Rescheduling {
    pub moves: Vec<PodMove>,
    pub unschedulable: Vec<Pod>,
}

/// Places the reschedulable pods of `candidates` onto the other nodes of the snapshot,
/// highest priority first.
pub fn simulate_rescheduling(snapshot: &StateSnapshot, placement: &dyn PlacementAlgorithm,
                             candidates: &[&Candidate]) -> Result<Rescheduling, ConsolidationError> {
    let excluded: BTreeSet<u32> = candidates.iter().map(|candidate| candidate.node_id).collect();
    let mut nodes: BTreeMap<u32, Node> = snapshot.nodes().iter()
        .filter(|(node_id, _)| !excluded.contains(node_id))
        .map(|(node_id, node)| (*node_id, node.clone()))
        .collect();

    let mut pods = Vec::new();
    for candidate in candidates {
        for pod_id in &candidate.reschedulable_pods {
            pods.push(snapshot.pod(*pod_id).ok_or(ConsolidationError::UnknownPod(*pod_id))?);
        }
    }
    pods.sort_by(|a, b| b.cmp(a).then(a.id.cmp(&b.id)));

    let mut rescheduling = Rescheduling::default();
    for pod in pods {
        let placed = match placement.select_node(pod, &nodes) {
            Some(node_id) => nodes.get_mut(&node_id)
                .map_or(false, |node| node.add_pod(pod))
                .then_some(node_id),
            None => None,
        };
        match placed {
            Some(node_id) => rescheduling.moves.push(PodMove { pod_id: pod.id, destination: Some(node_id) }),
            None => rescheduling.unschedulable.push(pod.clone()),
        }
    }
    Ok(rescheduling)
}

/// Checks whether the candidates can be disrupted together, either by deleting them outright or
/// by replacing them with a single cheaper node.
pub fn evaluate_candidates(mode: ConsolidationMode, pool: &CandidatePool, candidates: &[&Candidate],
                           placement: &dyn PlacementAlgorithm, pricing: &dyn PricingProvider)
                           -> Result<Option<Command>, ConsolidationError> {
    let Some(first) = candidates.first() else {
        return Ok(None);
    };
    let snapshot = pool.snapshot();
    let node_ids: Vec<u32> = candidates.iter().map(|candidate| candidate.node_id).collect();
    let total_price: f64 = candidates.iter().map(|candidate| candidate.price).sum();
    let mut rescheduling = simulate_rescheduling(snapshot, placement, candidates)?;

    if rescheduling.unschedulable.is_empty() {
        return Ok(Some(Command::delete(mode, node_ids, rescheduling.moves, snapshot.generation(), total_price)));
    }

    let node_pool = first.node_pool.as_str();
    if !rescheduling.unschedulable.iter().all(|pod| pod.tolerates_node_pool(node_pool)) {
        return Ok(None);
    }
    let cpu: f32 = rescheduling.unschedulable.iter().map(|pod| pod.requested_cpu).sum();
    let memory: f64 = rescheduling.unschedulable.iter().map(|pod| pod.requested_memory).sum();
    match pricing.cheapest_fitting(cpu, memory)? {
        Some(instance_type) if instance_type.price < total_price => {
            let savings = total_price - instance_type.price;
            rescheduling.moves.extend(rescheduling.unschedulable.iter()
                .map(|pod| PodMove { pod_id: pod.id, destination: None }));
            let replacement = ReplacementNode { node_pool: node_pool.to_string(), instance_type };
            Ok(Some(Command::replace(mode, node_ids, rescheduling.moves, replacement,
                                     snapshot.generation(), savings)))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::command::CommandKind;
    use crate::instance_type::{InstanceType, InstanceTypeCatalog};
    use crate::placement::MostRequestedPlacement;
    use crate::pod::PodOwner;

    /// Builds a snapshot from `(node, [(cpu, memory)])` specs, all nodes `m5.xlarge` unless noted.
    pub(crate) fn snapshot_of(specs: &[(&str, &[(f32, f64)])]) -> Arc<StateSnapshot> {
        let mut nodes = BTreeMap::new();
        let mut pods = BTreeMap::new();
        let mut pod_id = 0;
        for (index, (instance_type, pod_specs)) in specs.iter().enumerate() {
            let catalog = catalog();
            let shape = catalog.get(instance_type).unwrap();
            let node_id = index as u32 + 1;
            let mut node = Node::new(node_id, "default", instance_type, shape.cpu, shape.memory);
            for (cpu, memory) in pod_specs.iter() {
                pod_id += 1;
                let mut pod = Pod::new(pod_id, *cpu, *memory, 100, PodOwner::Deployment(1));
                assert!(node.add_pod(&pod));
                pod.node_id = Some(node_id);
                pods.insert(pod_id, pod);
            }
            nodes.insert(node_id, node);
        }
        Arc::new(StateSnapshot::new(1, nodes, pods))
    }

    pub(crate) fn catalog() -> InstanceTypeCatalog {
        InstanceTypeCatalog::new(vec![
            InstanceType::new("m5.large", 2.0, 8.0, 0.096),
            InstanceType::new("m5.xlarge", 4.0, 16.0, 0.192),
            InstanceType::new("m5.2xlarge", 8.0, 32.0, 0.384),
        ])
    }

    #[test]
    fn test_delete_when_pods_fit_elsewhere() {
        let snapshot = snapshot_of(&[("m5.xlarge", &[(3.0, 4.0)]), ("m5.xlarge", &[(0.5, 1.0)])]);
        let pool = CandidatePool::from_snapshot(snapshot, &catalog(), 10).unwrap();
        let candidate = pool.candidates().iter().find(|c| c.node_id == 2).unwrap();

        let command = evaluate_candidates(ConsolidationMode::SingleNode, &pool, &[candidate],
                                          &MostRequestedPlacement::new(), &catalog())
            .unwrap()
            .unwrap();
        assert_eq!(command.kind, CommandKind::Delete);
        assert_eq!(command.candidates, vec![2]);
        assert_eq!(command.pod_moves, vec![PodMove { pod_id: 2, destination: Some(1) }]);
        assert_eq!(command.savings, 0.192);
    }

    #[test]
    fn test_replace_with_cheaper_node() {
        let snapshot = snapshot_of(&[("m5.2xlarge", &[(1.0, 2.0)]), ("m5.xlarge", &[(3.5, 14.0)])]);
        let pool = CandidatePool::from_snapshot(snapshot, &catalog(), 10).unwrap();
        let candidate = pool.candidates().iter().find(|c| c.node_id == 1).unwrap();

        let command = evaluate_candidates(ConsolidationMode::SingleNode, &pool, &[candidate],
                                          &MostRequestedPlacement::new(), &catalog())
            .unwrap()
            .unwrap();
        assert_eq!(command.kind, CommandKind::Replace);
        assert_eq!(command.replacement.as_ref().unwrap().instance_type.name, "m5.large");
        assert_eq!(command.pod_moves, vec![PodMove { pod_id: 1, destination: None }]);
        assert!((command.savings - 0.288).abs() < 1e-9);
    }

    #[test]
    fn test_no_command_when_nothing_cheaper() {
        let snapshot = snapshot_of(&[("m5.large", &[(1.5, 6.0)]), ("m5.large", &[(1.5, 6.0)])]);
        let pool = CandidatePool::from_snapshot(snapshot, &catalog(), 10).unwrap();
        let candidate = &pool.candidates()[0];
        let command = evaluate_candidates(ConsolidationMode::SingleNode, &pool, &[candidate],
                                          &MostRequestedPlacement::new(), &catalog())
            .unwrap();
        assert!(command.is_none());
    }
}
