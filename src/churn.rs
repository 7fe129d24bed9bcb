//! Random workload churn. Each churn event is unrelated to consolidation but still invalidates
//! the staleness tracker.

use std::cell::RefCell;
use std::rc::Rc;
use dslab_core::{cast, Event, EventHandler, SimulationContext};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::cluster_state::ClusterState;
use crate::events::churn::ChurnTick;
use crate::events::cluster::{PodDeleted, PodSubmitted};
use crate::pod::{Pod, PodOwner};
use crate::simulation_config::ChurnConfig;

pub struct ChurnGenerator {
    pub id: u32,
    cluster_state: Rc<RefCell<ClusterState>>,
    cluster_state_id: u32,
    config: ChurnConfig,
    rng: StdRng,
    /// Churn pods currently alive, oldest first.
    pods: Vec<u64>,

    ctx: SimulationContext,
}

impl ChurnGenerator {
    pub fn new(cluster_state: Rc<RefCell<ClusterState>>, cluster_state_id: u32, config: ChurnConfig,
               ctx: SimulationContext) -> Self {
        ctx.emit(ChurnTick {}, ctx.id(), config.interval);
        Self {
            id: ctx.id(),
            cluster_state,
            cluster_state_id,
            rng: StdRng::seed_from_u64(config.seed),
            config,
            pods: Vec::default(),
            ctx,
        }
    }

    pub fn tick(&mut self) {
        if !self.rng.gen_bool(self.config.rate) {
            return;
        }
        if !self.pods.is_empty() && self.rng.gen_bool(0.5) {
            let index = self.rng.gen_range(0..self.pods.len());
            let pod_id = self.pods.swap_remove(index);
            self.ctx.emit(PodDeleted { pod_id }, self.cluster_state_id, 0.0);
        } else {
            let pod_id = self.cluster_state.borrow_mut().generate_pod_id();
            let pod = Pod::new(pod_id, self.config.requested_cpu, self.config.requested_memory, 0, PodOwner::None);
            self.pods.push(pod_id);
            self.ctx.emit(PodSubmitted { pod }, self.cluster_state_id, 0.0);
        }
    }
}

impl EventHandler for ChurnGenerator {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            ChurnTick {} => {
                self.tick();
                self.ctx.emit(ChurnTick {}, self.id, self.config.interval);
            }
        })
    }
}
