//! Disruption commands produced by planners.

use std::fmt::{Display, Formatter};
use serde::Serialize;
use crate::consolidation::ConsolidationMode;
use crate::instance_type::InstanceType;
use crate::snapshot::StateSnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CommandKind {
    /// Drain the candidates and terminate them, their pods fit on existing nodes.
    Delete,
    /// Launch one cheaper node, drain the candidates onto it and terminate them.
    Replace,
}

impl Display for CommandKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            CommandKind::Delete => write!(f, "delete"),
            CommandKind::Replace => write!(f, "replace"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReplacementNode {
    pub node_pool: String,
    pub instance_type: InstanceType,
}

/// Where a pod goes when its node is drained. `None` means the replacement node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PodMove {
    pub pod_id: u64,
    pub destination: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Command {
    pub kind: CommandKind,
    pub mode: ConsolidationMode,
    pub candidates: Vec<u32>,
    pub pod_moves: Vec<PodMove>,
    pub replacement: Option<ReplacementNode>,
    /// Generation of the snapshot the command was computed from.
    pub generation: u64,
    /// Hourly price saved once the command is applied.
    pub savings: f64,
}

impl Command {
    pub fn delete(mode: ConsolidationMode, candidates: Vec<u32>, pod_moves: Vec<PodMove>,
                  generation: u64, savings: f64) -> Self {
        Self {
            kind: CommandKind::Delete,
            mode,
            candidates,
            pod_moves,
            replacement: None,
            generation,
            savings,
        }
    }

    pub fn replace(mode: ConsolidationMode, candidates: Vec<u32>, pod_moves: Vec<PodMove>,
                   replacement: ReplacementNode, generation: u64, savings: f64) -> Self {
        Self {
            kind: CommandKind::Replace,
            mode,
            candidates,
            pod_moves,
            replacement: Some(replacement),
            generation,
            savings,
        }
    }

    pub fn pods_to_move(&self) -> impl Iterator<Item = u64> + '_ {
        self.pod_moves.iter().map(|pod_move| pod_move.pod_id)
    }

    /// True when every node and pod the command names exists in the snapshot.
    pub fn references_snapshot(&self, snapshot: &StateSnapshot) -> bool {
        self.candidates.iter().all(|node_id| snapshot.node(*node_id).is_some())
            && self.pod_moves.iter().all(|pod_move| {
                snapshot.pod(pod_move.pod_id).is_some()
                    && pod_move.destination.map_or(true, |node_id| snapshot.node(node_id).is_some())
            })
    }

    /// True when the cluster has moved past the generation the command was planned against.
    pub fn is_stale(&self, current_generation: u64) -> bool {
        self.generation < current_generation
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{} {} nodes {:?} moving {} pods", self.mode, self.kind, self.candidates, self.pod_moves.len())?;
        if let Some(replacement) = &self.replacement {
            write!(f, " to new {} node", replacement.instance_type.name)?;
        }
        write!(f, " (saves {:.3}/h, generation {})", self.savings, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use crate::node::Node;
    use crate::pod::{Pod, PodOwner};

    #[test]
    fn test_references_snapshot() {
        let snapshot = StateSnapshot::new(
            5,
            BTreeMap::from([(1, Node::new(1, "default", "m5.large", 2.0, 8.0))]),
            BTreeMap::from([(9, Pod::new(9, 1.0, 1.0, 100, PodOwner::None))]),
        );
        let valid = Command::delete(ConsolidationMode::SingleNode, vec![1],
                                    vec![PodMove { pod_id: 9, destination: None }], 5, 0.1);
        assert!(valid.references_snapshot(&snapshot));
        assert!(!valid.is_stale(5));
        assert!(valid.is_stale(6));

        let unknown_destination = Command::delete(ConsolidationMode::SingleNode, vec![1],
                                                  vec![PodMove { pod_id: 9, destination: Some(4) }], 5, 0.1);
        assert!(!unknown_destination.references_snapshot(&snapshot));
        let unknown_node = Command::delete(ConsolidationMode::MultiNode, vec![1, 2], vec![], 5, 0.1);
        assert!(!unknown_node.references_snapshot(&snapshot));
    }
}
