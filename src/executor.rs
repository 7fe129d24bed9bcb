//! Applies disruption commands to the cluster state.

use std::cell::RefCell;
use std::rc::Rc;
use dslab_core::{cast, Event, EventHandler, SimulationContext};
use log::{info, warn};
use crate::cluster_state::ClusterState;
use crate::command::{Command, CommandKind};
use crate::error::ConsolidationError;
use crate::events::disruption::{CommandFinished, DrainNodes, ExecuteCommand, ReplacementReady};
use crate::node::Node;
use crate::simulation_config::SimulationConfig;
use crate::simulation_metrics::ConsolidationStats;

pub struct Executor {
    pub id: u32,
    cluster_state: Rc<RefCell<ClusterState>>,
    disruption_controller_id: u32,
    stats: Rc<RefCell<ConsolidationStats>>,

    ctx: SimulationContext,
    sim_config: Rc<SimulationConfig>,
}

impl Executor {
    pub fn new(cluster_state: Rc<RefCell<ClusterState>>, disruption_controller_id: u32,
               stats: Rc<RefCell<ConsolidationStats>>, ctx: SimulationContext,
               sim_config: Rc<SimulationConfig>) -> Self {
        Self {
            id: ctx.id(),
            cluster_state,
            disruption_controller_id,
            stats,
            ctx,
            sim_config,
        }
    }

    /// Commands naming vanished nodes are always rejected, stale ones only if validation is on.
    fn validate(&self, command: &Command) -> Result<(), String> {
        let mut cluster_state = self.cluster_state.borrow_mut();
        let current_generation = cluster_state.generation();
        if self.sim_config.validate_command_generation && command.is_stale(current_generation) {
            return Err(format!("planned at generation {}, cluster is at {}", command.generation,
                               current_generation));
        }
        if !command.references_snapshot(&cluster_state.snapshot()) {
            return Err("command references nodes or pods that no longer exist".to_string());
        }
        Ok(())
    }

    fn start(&mut self, command: Command) -> Result<(), ConsolidationError> {
        self.cluster_state.borrow_mut().mark_nodes_for_deletion(&command.candidates)?;
        match command.kind {
            CommandKind::Delete => {
                self.ctx.emit(DrainNodes { command, replacement_node_id: None }, self.id,
                              self.sim_config.command_execution_delay);
            }
            CommandKind::Replace => {
                self.ctx.emit(ReplacementReady { command }, self.id, self.sim_config.node_provisioning_delay);
            }
        }
        Ok(())
    }

    fn launch_replacement(&mut self, command: Command) {
        let replacement_node_id = command.replacement.as_ref().map(|replacement| {
            let mut cluster_state = self.cluster_state.borrow_mut();
            let node_id = cluster_state.generate_node_id();
            let instance_type = &replacement.instance_type;
            cluster_state.add_node(Node::new(node_id, &replacement.node_pool, &instance_type.name,
                                             instance_type.cpu, instance_type.memory))
        });
        if let Some(node_id) = replacement_node_id {
            info!("time {:.1}: replacement node {} is ready", self.ctx.time(), node_id);
        }
        self.ctx.emit(DrainNodes { command, replacement_node_id }, self.id,
                      self.sim_config.command_execution_delay);
    }

    /// Moves the pods as planned, then terminates the candidates. Pods that no longer fit
    /// their planned destination go back to pending when their node is removed.
    fn drain(&mut self, command: &Command, replacement_node_id: Option<u32>) -> Result<(), ConsolidationError> {
        let mut cluster_state = self.cluster_state.borrow_mut();
        for pod_move in &command.pod_moves {
            let Some(destination) = pod_move.destination.or(replacement_node_id) else {
                continue;
            };
            if cluster_state.pod(pod_move.pod_id).is_none() || cluster_state.node(destination).is_none() {
                continue;
            }
            if !cluster_state.move_pod(pod_move.pod_id, destination)? {
                warn!("pod {} no longer fits node {}", pod_move.pod_id, destination);
            }
        }
        for node_id in &command.candidates {
            if cluster_state.node(*node_id).is_some() {
                cluster_state.remove_node(*node_id)?;
            }
        }
        Ok(())
    }

    fn finish(&self, executed: bool) {
        self.ctx.emit(CommandFinished { executed }, self.disruption_controller_id, 0.0);
    }
}

impl EventHandler for Executor {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            ExecuteCommand { command } => {
                if let Err(reason) = self.validate(&command) {
                    warn!("time {:.1}: rejecting command {}: {}", self.ctx.time(), command, reason);
                    self.finish(false);
                    return;
                }
                if let Err(e) = self.start(command) {
                    warn!("can't start command: {}", e);
                    self.finish(false);
                }
            }
            ReplacementReady { command } => {
                self.launch_replacement(command);
            }
            DrainNodes { command, replacement_node_id } => {
                let result = self.drain(&command, replacement_node_id);
                if let Err(e) = result {
                    warn!("can't drain nodes of command {}: {}", command, e);
                    self.finish(false);
                    return;
                }
                info!("time {:.1}: executed {}", self.ctx.time(), command);
                {
                    let mut stats = self.stats.borrow_mut();
                    stats.executed += 1;
                    stats.nodes_removed += command.candidates.len() as u64;
                    if command.kind == CommandKind::Replace {
                        stats.nodes_replaced += 1;
                    }
                    stats.savings += command.savings;
                }
                self.finish(true);
            }
        })
    }
}
