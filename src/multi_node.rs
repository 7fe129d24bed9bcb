//! Multi node consolidation: removes several nodes at once, optionally behind one replacement.

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

pub struct MultiNodeConsolidation {
    placement: Box<dyn PlacementAlgorithm>,
    pricing: Arc<dyn PricingProvider>,
    timeout: Option<Duration>,
    max_candidates: usize,
}

impl MultiNodeConsolidation {
    pub fn new(placement: Box<dyn PlacementAlgorithm>, pricing: Arc<dyn PricingProvider>,
               timeout: Option<Duration>, max_candidates: usize) -> Self {
        Self {
            placement,
            pricing,
            timeout,
            max_candidates,
        }
    }
}

impl CommandPlanner for MultiNodeConsolidation {
    /// Binary searches for the largest prefix of candidates that can be disrupted together.
    fn compute_commands(&self, ctx: &PlanningContext, pool: &CandidatePool)
        -> Result<Vec<Command>, ConsolidationError> {
        let ctx = ctx.child(self.timeout);
        let candidates = pool.budgeted_prefix(self.max_candidates);
        let mut best: Option<Command> = None;
        let (mut min, mut max) = (1, candidates.len());
        while min <= max {
            ctx.check()?;
            let mid = (min + max) / 2;
            match evaluate_candidates(ConsolidationMode::MultiNode, pool, &candidates[..mid],
                                      self.placement.as_ref(), self.pricing.as_ref())? {
                Some(command) => {
                    debug!("first {} candidates can be consolidated together", mid);
                    best = Some(command);
                    min = mid + 1;
                }
                None => max = mid - 1,
            }
        }
        match best {
            Some(command) => {
                info!("multi node consolidation found command: {}", command);
                Ok(vec![command])
            }
            None => Ok(Vec::new()),
        }
    }
}
