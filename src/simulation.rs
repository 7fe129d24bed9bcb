use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use dslab_core::context::SimulationContext;
use dslab_core::simulation::Simulation;
use sugars::{rc, refcell};
use crate::churn::ChurnGenerator;
use crate::cluster_state::ClusterState;
use crate::consolidation::Consolidation;
use crate::disruption_controller::DisruptionController;
use crate::error::{ConfigError, ConsolidationError};
use crate::events::cluster::{NodeUpdated, PodDeleted, PodSubmitted};
use crate::executor::Executor;
use crate::instance_type::{InstanceTypeCatalog, PricingProvider};
use crate::node::Node;
use crate::pod::{Pod, PodOwner};
use crate::simulation_config::SimulationConfig;
use crate::simulation_metrics::{ConsolidationStats, SimulationResults};
use crate::staleness::{ConsolidationState, ManualClock, StalenessTracker};

pub struct ConsolidationSimulation {
    cluster_state: Rc<RefCell<ClusterState>>,
    disruption_controller: Rc<RefCell<DisruptionController>>,
    tracker: Arc<StalenessTracker>,
    catalog: Arc<InstanceTypeCatalog>,
    stats: Rc<RefCell<ConsolidationStats>>,

    sim: Simulation,
    ctx: SimulationContext,
    cluster_state_id: u32,
    sim_config: Rc<SimulationConfig>,
}

impl ConsolidationSimulation {
    /// Creates a simulation with specified config.
    pub fn new(mut sim: Simulation, sim_config: SimulationConfig) -> Result<Self, ConfigError> {
        sim_config.validate()?;
        let sim_config = rc!(sim_config);
        let clock = Arc::new(ManualClock::new(sim.time()));
        let tracker = Arc::new(StalenessTracker::with_clock(clock.clone(), sim_config.consolidated_ttl));
        let catalog = Arc::new(InstanceTypeCatalog::new(sim_config.instance_types.clone()));
        let stats = rc!(refcell!(ConsolidationStats::default()));

        let cluster_state = rc!(refcell!(ClusterState::new(tracker.clone(), sim_config.placement.build())));
        sim.add_handler("cluster_state", cluster_state.clone());
        let cluster_state_id = sim.lookup_id("cluster_state");

        let controller_ctx = sim.create_context("disruption_controller");
        let executor_ctx = sim.create_context("executor");
        let consolidation = Consolidation::new(tracker.clone(), catalog.clone(), sim_config.placement.build(),
                                               sim_config.consolidation_settings()?);

        let executor = rc!(refcell!(Executor::new(cluster_state.clone(), controller_ctx.id(), stats.clone(),
                                                  executor_ctx, sim_config.clone())));
        let executor_id = executor.borrow().id;
        sim.add_handler("executor", executor);

        let disruption_controller = rc!(refcell!(DisruptionController::new(
            cluster_state.clone(), executor_id, &consolidation, catalog.clone(), clock, stats.clone(),
            controller_ctx, sim_config.clone())));
        sim.add_handler("disruption_controller", disruption_controller.clone());

        if let Some(churn_config) = sim_config.churn.clone() {
            let churn = rc!(refcell!(ChurnGenerator::new(cluster_state.clone(), cluster_state_id, churn_config,
                                                         sim.create_context("churn"))));
            sim.add_handler("churn", churn);
        }

        let ctx = sim.create_context("simulation");
        let mut simulation = Self {
            cluster_state,
            disruption_controller,
            tracker,
            catalog,
            stats,
            sim,
            ctx,
            cluster_state_id,
            sim_config,
        };

        for node_config in simulation.sim_config.nodes.clone() {
            for _ in 0..node_config.count {
                simulation.add_node(&node_config.node_pool, &node_config.instance_type)
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            }
        }

        for (index, pod_config) in simulation.sim_config.pods.clone().into_iter().enumerate() {
            for _ in 0..pod_config.count {
                let pod_id = simulation.cluster_state.borrow_mut().generate_pod_id();
                let mut pod = Pod::new(pod_id, pod_config.requested_cpu, pod_config.requested_memory,
                                       pod_config.priority_weight, pod_config.owner(index as u64 + 1));
                pod.do_not_disrupt = pod_config.do_not_disrupt;
                pod.node_pool_selector = pod_config.node_pool_selector.clone();
                simulation.submit(pod, pod_config.submit_time);
            }
        }

        Ok(simulation)
    }

    /// Add new node to the cluster right away, return node_id
    pub fn add_node(&mut self, node_pool: &str, instance_type: &str) -> Result<u32, ConsolidationError> {
        let shape = self.catalog.get(instance_type)?.clone();
        let mut cluster_state = self.cluster_state.borrow_mut();
        let node_id = cluster_state.generate_node_id();
        Ok(cluster_state.add_node(Node::new(node_id, node_pool, &shape.name, shape.cpu, shape.memory)))
    }

    pub fn submit_pod(&mut self, requested_cpu: f32, requested_memory: f64, priority_weight: u64,
                      owner: PodOwner, delay: f64) -> u64 {
        let pod_id = self.cluster_state.borrow_mut().generate_pod_id();
        self.submit(Pod::new(pod_id, requested_cpu, requested_memory, priority_weight, owner), delay);
        pod_id
    }

    /// Submits a prepared pod after `delay` seconds.
    pub fn submit(&mut self, pod: Pod, delay: f64) {
        self.ctx.emit(PodSubmitted { pod }, self.cluster_state_id, delay);
    }

    pub fn remove_pod(&mut self, pod_id: u64, delay: f64) {
        self.ctx.emit(PodDeleted { pod_id }, self.cluster_state_id, delay);
    }

    /// Applies the updated capacity and annotations of an existing node after `delay` seconds.
    pub fn update_node(&mut self, node: Node, delay: f64) {
        self.ctx.emit(NodeUpdated { node }, self.cluster_state_id, delay);
    }

    pub fn node(&self, node_id: u32) -> Option<Node> {
        self.cluster_state.borrow().node(node_id).cloned()
    }

    pub fn node_ids(&self) -> Vec<u32> {
        self.cluster_state.borrow().nodes().keys().copied().collect()
    }

    pub fn node_count(&self) -> usize {
        self.cluster_state.borrow().nodes().len()
    }

    pub fn pod_node(&self, pod_id: u64) -> Option<u32> {
        self.cluster_state.borrow().pod(pod_id).and_then(|pod| pod.node_id)
    }

    pub fn pending_pods(&self) -> usize {
        self.cluster_state.borrow().pending_pods()
    }

    /// Hourly price of all nodes in the cluster.
    pub fn cluster_cost(&self) -> f64 {
        self.cluster_state.borrow().nodes().values()
            .map(|node| self.catalog.price(&node.instance_type).unwrap_or(0.0))
            .sum()
    }

    pub fn is_consolidated(&self) -> bool {
        self.tracker.is_consolidated()
    }

    pub fn tracker(&self) -> Arc<StalenessTracker> {
        self.tracker.clone()
    }

    pub fn stats(&self) -> ConsolidationStats {
        self.stats.borrow().clone()
    }

    /// Runs a consolidation pass right now, outside of the regular scan timer.
    pub fn reconcile_now(&mut self) {
        self.disruption_controller.borrow_mut().reconcile();
    }

    pub fn results(&self) -> SimulationResults {
        SimulationResults {
            finish_time: self.sim.time(),
            node_count: self.node_count(),
            pending_pods: self.pending_pods(),
            cluster_cost: self.cluster_cost(),
            stats: self.stats(),
        }
    }

    pub fn finish_simulation(&self, path: &str) -> Result<(), std::io::Error> {
        self.results().save(path)
    }

    /// Performs the specified number of steps through the simulation (see dslab-core docs).
    pub fn steps(&mut self, step_count: u64) -> bool {
        self.sim.steps(step_count)
    }

    /// Steps through the simulation with duration limit (see dslab-core docs).
    pub fn step_for_duration(&mut self, time: f64) {
        self.sim.step_for_duration(time);
    }

    /// Steps through the simulation until the specified time (see dslab-core docs).
    pub fn step_until_time(&mut self, time: f64) {
        self.sim.step_until_time(time);
    }

    /// Returns the total number of created events.
    pub fn event_count(&self) -> u64 {
        self.sim.event_count()
    }

    /// Returns the current simulation time.
    pub fn current_time(&self) -> f64 {
        self.sim.time()
    }
}
