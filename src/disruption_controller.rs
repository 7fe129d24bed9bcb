//! Reconciliation loop driving the consolidation modes on a timer.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use dslab_core::{cast, Event, EventHandler, SimulationContext};
use log::{info, warn};
use crate::candidate::CandidatePool;
use crate::cluster_state::ClusterState;
use crate::consolidation::{Consolidation, ConsolidationController, ConsolidationOutcome};
use crate::context::PlanningContext;
use crate::events::disruption::{CommandFinished, ConsolidationScan, ExecuteCommand};
use crate::instance_type::PricingProvider;
use crate::simulation_config::SimulationConfig;
use crate::simulation_metrics::ConsolidationStats;
use crate::staleness::{ConsolidationState, ManualClock};

pub struct DisruptionController {
    pub id: u32,
    cluster_state: Rc<RefCell<ClusterState>>,
    executor_id: u32,
    /// Evaluated in order, the first mode producing a command wins the pass.
    modes: Vec<ConsolidationController>,
    state: Arc<dyn ConsolidationState>,
    pricing: Arc<dyn PricingProvider>,
    clock: Arc<ManualClock>,
    stats: Rc<RefCell<ConsolidationStats>>,
    command_in_flight: bool,

    ctx: SimulationContext,
    sim_config: Rc<SimulationConfig>,
}

impl DisruptionController {
    pub fn new(cluster_state: Rc<RefCell<ClusterState>>, executor_id: u32, consolidation: &Consolidation,
               pricing: Arc<dyn PricingProvider>, clock: Arc<ManualClock>,
               stats: Rc<RefCell<ConsolidationStats>>, ctx: SimulationContext,
               sim_config: Rc<SimulationConfig>) -> Self {
        ctx.emit(ConsolidationScan {}, ctx.id(), sim_config.scan_interval);
        Self {
            id: ctx.id(),
            cluster_state,
            executor_id,
            modes: vec![consolidation.multi_node(), consolidation.single_node()],
            state: consolidation.state().clone(),
            pricing,
            clock,
            stats,
            command_in_flight: false,
            ctx,
            sim_config,
        }
    }

    fn candidate_pool(&self) -> Result<CandidatePool, crate::error::ConsolidationError> {
        let snapshot = self.cluster_state.borrow_mut().snapshot();
        let mut pool = CandidatePool::from_snapshot(snapshot, self.pricing.as_ref(),
                                                    self.sim_config.default_disruption_budget)?;
        for budget in &self.sim_config.disruption_budgets {
            pool = pool.with_budget(&budget.node_pool, budget.nodes);
        }
        Ok(pool)
    }

    /// One consolidation pass over a fresh snapshot.
    pub fn reconcile(&mut self) {
        self.stats.borrow_mut().scans += 1;
        let pool = match self.candidate_pool() {
            Ok(pool) => pool,
            Err(e) => {
                warn!("can't build consolidation candidates: {}", e);
                self.stats.borrow_mut().planning_failures += 1;
                return;
            }
        };

        let ctx = PlanningContext::new();
        let mut planned = false;
        for mode in &self.modes {
            match mode.run(&ctx, &pool) {
                Ok(ConsolidationOutcome::BailedOut) => {
                    self.stats.borrow_mut().bailouts += 1;
                }
                Ok(ConsolidationOutcome::Planned(commands)) => {
                    self.stats.borrow_mut().planning_runs += 1;
                    planned = true;
                    if let Some(command) = commands.into_iter().next() {
                        info!("time {:.1}: sending command to executor: {}", self.ctx.time(), command);
                        self.stats.borrow_mut().commands += 1;
                        self.command_in_flight = true;
                        self.ctx.emit(ExecuteCommand { command }, self.executor_id, 0.0);
                        return;
                    }
                }
                Err(e) => {
                    warn!("{} consolidation failed: {}", mode.mode(), e);
                    let mut stats = self.stats.borrow_mut();
                    if e.is_cancellation() {
                        stats.cancelled_runs += 1;
                    } else {
                        stats.planning_failures += 1;
                    }
                    return;
                }
            }
        }
        if planned {
            info!("time {:.1}: nothing to consolidate, marking cluster consolidated", self.ctx.time());
            self.state.mark_consolidated();
        }
    }
}

impl EventHandler for DisruptionController {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            ConsolidationScan {} => {
                self.clock.set(self.ctx.time());
                if !self.command_in_flight {
                    self.reconcile();
                }
                self.ctx.emit(ConsolidationScan {}, self.id, self.sim_config.scan_interval);
            }
            CommandFinished { executed } => {
                if !executed {
                    self.stats.borrow_mut().rejected += 1;
                }
                self.command_in_flight = false;
            }
        })
    }
}
