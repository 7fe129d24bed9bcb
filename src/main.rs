use clap::Parser;
use dslab_core::Simulation;
use log::{error, info, LevelFilter};
use K8s_consolidation::logger::StdoutLogger;
use K8s_consolidation::simulation::ConsolidationSimulation;
use K8s_consolidation::simulation_config::SimulationConfig;

/// Simulates consolidation of a cluster described by a YAML config.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the simulation config.
    #[arg(long)]
    config: String,

    /// Simulated seconds to run.
    #[arg(long, default_value_t = 3600.0)]
    duration: f64,

    /// Where to save the run results as JSON.
    #[arg(long, default_value = "./results.json")]
    output: String,

    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Seeds the simulation and overrides the churn seed of the config.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() {
    let args = Args::parse();
    if let Err(e) = StdoutLogger::init(args.log_level) {
        eprintln!("can't install logger: {}", e);
    }

    let sim_config = match SimulationConfig::from_file(&args.config) {
        Ok(sim_config) => match args.seed {
            Some(seed) => sim_config.with_churn_seed(seed),
            None => sim_config,
        },
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    let mut consolidation_sim = match ConsolidationSimulation::new(Simulation::new(args.seed.unwrap_or(42)), sim_config) {
        Ok(consolidation_sim) => consolidation_sim,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    consolidation_sim.step_for_duration(args.duration);
    let results = consolidation_sim.results();
    info!("finished at {:.1}s with {} nodes costing {:.3}/h, stats: {:?}", results.finish_time,
          results.node_count, results.cluster_cost, results.stats);
    if let Err(e) = results.save(&args.output) {
        error!("can't save results to {}: {}", args.output, e);
        std::process::exit(1);
    }
}
