//! Consolidation controller: gates command planning on the staleness tracker.

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use log::info;
use serde::Serialize;
use crate::candidate::CandidatePool;
use crate::command::Command;
use crate::context::PlanningContext;
use crate::error::ConsolidationError;
use crate::instance_type::PricingProvider;
use crate::multi_node::MultiNodeConsolidation;
use crate::placement::PlacementAlgorithm;
use crate::planner::CommandPlanner;
use crate::single_node::SingleNodeConsolidation;
use crate::staleness::ConsolidationState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ConsolidationMode {
    SingleNode,
    MultiNode,
}

impl Display for ConsolidationMode {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ConsolidationMode::SingleNode => write!(f, "single node"),
            ConsolidationMode::MultiNode => write!(f, "multi node"),
        }
    }
}

/// What a consolidation mode does once it has read the tracker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// The cluster is unchanged since the last pass that found nothing to do.
    Bailout,
    Plan,
}

pub fn decide(consolidated: bool) -> Decision {
    if consolidated {
        Decision::Bailout
    } else {
        Decision::Plan
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConsolidationOutcome {
    BailedOut,
    Planned(Vec<Command>),
}

impl ConsolidationOutcome {
    pub fn into_commands(self) -> Vec<Command> {
        match self {
            ConsolidationOutcome::BailedOut => Vec::new(),
            ConsolidationOutcome::Planned(commands) => commands,
        }
    }
}

/// Planner limits shared by the consolidation modes.
#[derive(Clone, Debug, PartialEq)]
pub struct ConsolidationSettings {
    pub single_node_timeout: Option<Duration>,
    pub multi_node_timeout: Option<Duration>,
    pub multi_node_max_candidates: usize,
}

impl Default for ConsolidationSettings {
    fn default() -> Self {
        Self {
            single_node_timeout: Some(Duration::from_secs(180)),
            multi_node_timeout: Some(Duration::from_secs(60)),
            multi_node_max_candidates: 100,
        }
    }
}

/// Dependencies shared by every consolidation mode. The tracker is injected, never global.
#[derive(Clone)]
pub struct Consolidation {
    state: Arc<dyn ConsolidationState>,
    pricing: Arc<dyn PricingProvider>,
    placement: Box<dyn PlacementAlgorithm>,
    settings: ConsolidationSettings,
}

impl Consolidation {
    pub fn new(state: Arc<dyn ConsolidationState>, pricing: Arc<dyn PricingProvider>,
               placement: Box<dyn PlacementAlgorithm>, settings: ConsolidationSettings) -> Self {
        Self {
            state,
            pricing,
            placement,
            settings,
        }
    }

    pub fn state(&self) -> &Arc<dyn ConsolidationState> {
        &self.state
    }

    pub fn single_node(&self) -> ConsolidationController {
        let planner = SingleNodeConsolidation::new(self.placement.clone(), self.pricing.clone(),
                                                   self.settings.single_node_timeout);
        ConsolidationController::new(ConsolidationMode::SingleNode, self.state.clone(), Box::new(planner))
    }

    pub fn multi_node(&self) -> ConsolidationController {
        let planner = MultiNodeConsolidation::new(self.placement.clone(), self.pricing.clone(),
                                                  self.settings.multi_node_timeout,
                                                  self.settings.multi_node_max_candidates);
        ConsolidationController::new(ConsolidationMode::MultiNode, self.state.clone(), Box::new(planner))
    }
}

pub struct ConsolidationController {
    mode: ConsolidationMode,
    state: Arc<dyn ConsolidationState>,
    planner: Box<dyn CommandPlanner>,
}

impl ConsolidationController {
    pub fn new(mode: ConsolidationMode, state: Arc<dyn ConsolidationState>,
               planner: Box<dyn CommandPlanner>) -> Self {
        Self {
            mode,
            state,
            planner,
        }
    }

    pub fn mode(&self) -> ConsolidationMode {
        self.mode
    }

    pub fn is_consolidated(&self) -> bool {
        self.state.is_consolidated()
    }

    /// Checks the tracker and plans only if something changed since the last quiet pass.
    ///
    /// Never marks the tracker consolidated itself; that is left to the reconciliation loop.
    pub fn run(&self, ctx: &PlanningContext, pool: &CandidatePool)
        -> Result<ConsolidationOutcome, ConsolidationError> {
        match decide(self.is_consolidated()) {
            Decision::Bailout => {
                info!("{} consolidation bailed out: cluster state unchanged since last pass", self.mode);
                Ok(ConsolidationOutcome::BailedOut)
            }
            Decision::Plan => {
                let commands = self.planner.compute_commands(ctx, pool)?;
                info!("{} consolidation planned {} commands over {} candidates", self.mode,
                      commands.len(), pool.len());
                Ok(ConsolidationOutcome::Planned(commands))
            }
        }
    }

    /// Same as `run`, with a bailout reported as an empty command list.
    pub fn compute_commands(&self, ctx: &PlanningContext, pool: &CandidatePool)
        -> Result<Vec<Command>, ConsolidationError> {
        self.run(ctx, pool).map(ConsolidationOutcome::into_commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide() {
        assert_eq!(decide(true), Decision::Bailout);
        assert_eq!(decide(false), Decision::Plan);
    }

    #[test]
    fn test_outcome_into_commands() {
        assert!(ConsolidationOutcome::BailedOut.into_commands().is_empty());
        assert!(ConsolidationOutcome::Planned(Vec::new()).into_commands().is_empty());
    }
}
