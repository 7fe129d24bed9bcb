use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::thread;
use log::{Level, LevelFilter, Log, Metadata, Record};
use K8s_consolidation::candidate::CandidatePool;
use K8s_consolidation::command::Command;
use K8s_consolidation::consolidation::{Consolidation, ConsolidationController, ConsolidationMode,
                                       ConsolidationOutcome, ConsolidationSettings};
use K8s_consolidation::context::PlanningContext;
use K8s_consolidation::error::ConsolidationError;
use K8s_consolidation::instance_type::{InstanceType, InstanceTypeCatalog};
use K8s_consolidation::node::Node;
use K8s_consolidation::placement::MostRequestedPlacement;
use K8s_consolidation::planner::CommandPlanner;
use K8s_consolidation::pod::{Pod, PodOwner, PodStatus};
use K8s_consolidation::snapshot::StateSnapshot;
use K8s_consolidation::staleness::{ConsolidationState, StalenessTracker};

/// Planner stub counting how often the controller reaches it.
struct CountingPlanner {
    invocations: Arc<AtomicUsize>,
}

impl CommandPlanner for CountingPlanner {
    fn compute_commands(&self, ctx: &PlanningContext, _pool: &CandidatePool)
        -> Result<Vec<Command>, ConsolidationError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        ctx.check()?;
        Ok(Vec::new())
    }
}

/// Planner stub failing the test if it is ever invoked.
struct UnreachablePlanner;

impl CommandPlanner for UnreachablePlanner {
    fn compute_commands(&self, _ctx: &PlanningContext, _pool: &CandidatePool)
        -> Result<Vec<Command>, ConsolidationError> {
        panic!("planner must not run while the cluster is consolidated");
    }
}

fn counting_controller(mode: ConsolidationMode, tracker: Arc<StalenessTracker>)
    -> (ConsolidationController, Arc<AtomicUsize>) {
    let invocations = Arc::new(AtomicUsize::new(0));
    let planner = CountingPlanner { invocations: invocations.clone() };
    (ConsolidationController::new(mode, tracker, Box::new(planner)), invocations)
}

fn catalog() -> Arc<InstanceTypeCatalog> {
    Arc::new(InstanceTypeCatalog::new(vec![
        InstanceType::new("m5.large", 2.0, 8.0, 0.096),
        InstanceType::new("m5.xlarge", 4.0, 16.0, 0.192),
    ]))
}

fn consolidation(tracker: Arc<StalenessTracker>) -> Consolidation {
    Consolidation::new(tracker, catalog(), Box::new(MostRequestedPlacement::new()),
                       ConsolidationSettings::default())
}

/// Three m5.xlarge nodes running one (1 cpu, 2 GB) pod each.
fn busy_pool() -> CandidatePool {
    let mut nodes = BTreeMap::new();
    let mut pods = BTreeMap::new();
    for node_id in 1..=3u32 {
        let mut node = Node::new(node_id, "default", "m5.xlarge", 4.0, 16.0);
        let mut pod = Pod::new(node_id as u64, 1.0, 2.0, 100, PodOwner::Deployment(1));
        assert!(node.add_pod(&pod));
        pod.node_id = Some(node_id);
        pod.status = PodStatus::Running;
        nodes.insert(node_id, node);
        pods.insert(pod.id, pod);
    }
    let snapshot = Arc::new(StateSnapshot::new(7, nodes, pods));
    CandidatePool::from_snapshot(snapshot, &*catalog(), 10).unwrap()
}

static RECORDS: Mutex<Vec<(Level, String)>> = Mutex::new(Vec::new());
static INIT_LOGGER: Once = Once::new();

struct RecordingLogger;

static LOGGER: RecordingLogger = RecordingLogger;

impl Log for RecordingLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        RECORDS.lock().unwrap().push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

fn init_logger() {
    INIT_LOGGER.call_once(|| {
        log::set_logger(&LOGGER).unwrap();
        log::set_max_level(LevelFilter::Info);
    });
}

#[test]
fn test_fresh_tracker_is_unconsolidated() {
    let c = consolidation(Arc::new(StalenessTracker::new()));
    assert!(!c.single_node().is_consolidated());
    assert!(!c.multi_node().is_consolidated());

    let c = consolidation(Arc::new(StalenessTracker::initialized(true)));
    assert!(c.single_node().is_consolidated());
    assert!(c.multi_node().is_consolidated());
}

#[test]
fn test_consolidated_state_bails_out_without_planning() {
    let tracker = Arc::new(StalenessTracker::initialized(true));
    for mode in [ConsolidationMode::SingleNode, ConsolidationMode::MultiNode] {
        let controller = ConsolidationController::new(mode, tracker.clone(), Box::new(UnreachablePlanner));
        let outcome = controller.run(&PlanningContext::new(), &CandidatePool::empty()).unwrap();
        assert_eq!(outcome, ConsolidationOutcome::BailedOut);
        assert!(controller.compute_commands(&PlanningContext::new(), &CandidatePool::empty())
            .unwrap()
            .is_empty());
    }
}

#[test]
fn test_consolidated_state_bails_out_for_busy_pool() {
    let pool = busy_pool();
    assert_eq!(pool.len(), 3);

    let tracker = Arc::new(StalenessTracker::initialized(true));
    for mode in [ConsolidationMode::SingleNode, ConsolidationMode::MultiNode] {
        let controller = ConsolidationController::new(mode, tracker.clone(), Box::new(UnreachablePlanner));
        assert_eq!(controller.run(&PlanningContext::new(), &pool).unwrap(), ConsolidationOutcome::BailedOut);
    }

    // The same pool is worth consolidating once the tracker is reset.
    tracker.mark_unconsolidated();
    let commands = consolidation(tracker).multi_node().compute_commands(&PlanningContext::new(), &pool).unwrap();
    assert_eq!(commands.len(), 1);
}

#[test]
fn test_bailout_is_logged_at_info() {
    init_logger();
    let tracker = Arc::new(StalenessTracker::initialized(true));
    let controller = ConsolidationController::new(ConsolidationMode::SingleNode, tracker, Box::new(UnreachablePlanner));
    controller.compute_commands(&PlanningContext::new(), &busy_pool()).unwrap();

    let records = RECORDS.lock().unwrap();
    assert!(records.iter()
        .any(|(level, message)| *level == Level::Info && message.contains("single node consolidation bailed out")));
}

#[test]
fn test_bailout_ignores_cancelled_context() {
    let tracker = Arc::new(StalenessTracker::initialized(true));
    let controller = ConsolidationController::new(ConsolidationMode::MultiNode, tracker, Box::new(UnreachablePlanner));
    let ctx = PlanningContext::new();
    ctx.cancel();
    assert_eq!(controller.compute_commands(&ctx, &CandidatePool::empty()), Ok(Vec::new()));
}

#[test]
fn test_empty_pool_plans_nothing() {
    let c = consolidation(Arc::new(StalenessTracker::new()));
    for controller in [c.single_node(), c.multi_node()] {
        let outcome = controller.run(&PlanningContext::new(), &CandidatePool::empty()).unwrap();
        assert_eq!(outcome, ConsolidationOutcome::Planned(Vec::new()));
    }
}

#[test]
fn test_mark_unconsolidated_reaches_planner() {
    let tracker = Arc::new(StalenessTracker::initialized(true));
    let (controller, invocations) = counting_controller(ConsolidationMode::SingleNode, tracker.clone());

    controller.compute_commands(&PlanningContext::new(), &CandidatePool::empty()).unwrap();
    assert_eq!(invocations.load(Ordering::SeqCst), 0);

    tracker.mark_unconsolidated();
    controller.compute_commands(&PlanningContext::new(), &CandidatePool::empty()).unwrap();
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_controller_never_marks_consolidated_itself() {
    let tracker = Arc::new(StalenessTracker::new());
    let (controller, invocations) = counting_controller(ConsolidationMode::MultiNode, tracker.clone());
    for _ in 0..3 {
        let commands = controller.compute_commands(&PlanningContext::new(), &CandidatePool::empty()).unwrap();
        assert!(commands.is_empty());
    }
    assert_eq!(invocations.load(Ordering::SeqCst), 3);
    assert!(!tracker.is_consolidated());

    tracker.mark_consolidated();
    controller.compute_commands(&PlanningContext::new(), &CandidatePool::empty()).unwrap();
    assert_eq!(invocations.load(Ordering::SeqCst), 3);
}

#[test]
fn test_cancellation_is_an_error_not_a_partial_result() {
    let tracker = Arc::new(StalenessTracker::new());
    let (controller, _) = counting_controller(ConsolidationMode::SingleNode, tracker);
    let ctx = PlanningContext::new();
    ctx.cancel();
    let error = controller.compute_commands(&ctx, &CandidatePool::empty()).unwrap_err();
    assert_eq!(error, ConsolidationError::Cancelled);
    assert!(error.is_cancellation());
}

#[test]
fn test_unconsolidation_from_another_thread_is_observed() {
    let tracker = Arc::new(StalenessTracker::initialized(true));
    let (controller, invocations) = counting_controller(ConsolidationMode::MultiNode, tracker.clone());

    let informer = {
        let tracker = tracker.clone();
        thread::spawn(move || tracker.mark_unconsolidated())
    };
    informer.join().unwrap();

    controller.compute_commands(&PlanningContext::new(), &CandidatePool::empty()).unwrap();
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_bailout_scenario_for_both_modes() {
    let tracker = Arc::new(StalenessTracker::new());
    let (single, single_runs) = counting_controller(ConsolidationMode::SingleNode, tracker.clone());
    let (multi, multi_runs) = counting_controller(ConsolidationMode::MultiNode, tracker.clone());
    let ctx = PlanningContext::new();

    assert!(!single.is_consolidated());
    assert!(!multi.is_consolidated());
    assert!(single.compute_commands(&ctx, &CandidatePool::empty()).unwrap().is_empty());
    assert!(multi.compute_commands(&ctx, &CandidatePool::empty()).unwrap().is_empty());

    tracker.mark_unconsolidated();
    assert!(!single.is_consolidated());
    assert!(!multi.is_consolidated());
    assert!(single.compute_commands(&ctx, &CandidatePool::empty()).unwrap().is_empty());
    assert!(multi.compute_commands(&ctx, &CandidatePool::empty()).unwrap().is_empty());

    // Every call went through planning, none bailed out.
    assert_eq!(single_runs.load(Ordering::SeqCst), 2);
    assert_eq!(multi_runs.load(Ordering::SeqCst), 2);
}
