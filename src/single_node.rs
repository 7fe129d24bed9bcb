//! Single node consolidation: removes or replaces one node at a time.

use std::sync::Arc;
use std::time::Duration;
use log::{debug, info};
use crate::candidate::CandidatePool;
use crate::command::Command;
use crate::consolidation::ConsolidationMode;
use crate::context::PlanningContext;
use crate::error::ConsolidationError;
use crate::instance_type::PricingProvider;
use crate::placement::PlacementAlgorithm;
use crate::planner::{evaluate_candidates, CommandPlanner};

pub struct SingleNodeConsolidation {
    placement: Box<dyn PlacementAlgorithm>,
    pricing: Arc<dyn PricingProvider>,
    timeout: Option<Duration>,
}

impl SingleNodeConsolidation {
    pub fn new(placement: Box<dyn PlacementAlgorithm>, pricing: Arc<dyn PricingProvider>,
               timeout: Option<Duration>) -> Self {
        Self {
            placement,
            pricing,
            timeout,
        }
    }
}

impl CommandPlanner for SingleNodeConsolidation {
    /// Walks the candidates cheapest first and returns the first one worth disrupting.
    fn compute_commands(&self, ctx: &PlanningContext, pool: &CandidatePool)
        -> Result<Vec<Command>, ConsolidationError> {
        let ctx = ctx.child(self.timeout);
        for candidate in pool.candidates() {
            ctx.check()?;
            if !pool.within_budget(&[candidate]) {
                debug!("node {} skipped: node pool {} has no disruption budget", candidate.node_id,
                       candidate.node_pool);
                continue;
            }
            match evaluate_candidates(ConsolidationMode::SingleNode, pool, &[candidate],
                                      self.placement.as_ref(), self.pricing.as_ref())? {
                Some(command) => {
                    info!("single node consolidation found command: {}", command);
                    return Ok(vec![command]);
                }
                None => debug!("node {} can't be consolidated", candidate.node_id),
            }
        }
        Ok(Vec::new())
    }
}
