use std::fs::File;
use std::io::{BufWriter, Error, Write};
use serde::Serialize;

/// Counters of one consolidation run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ConsolidationStats {
    /// Reconciliation passes started.
    pub scans: u64,
    /// Mode invocations skipped because the cluster was marked consolidated.
    pub bailouts: u64,
    /// Mode invocations that reached the planner.
    pub planning_runs: u64,
    pub planning_failures: u64,
    pub cancelled_runs: u64,
    /// Commands handed to the executor.
    pub commands: u64,
    pub executed: u64,
    pub rejected: u64,
    pub nodes_removed: u64,
    pub nodes_replaced: u64,
    /// Hourly price saved by executed commands.
    pub savings: f64,
}

#[derive(Serialize)]
pub struct SimulationResults {
    pub finish_time: f64,
    pub node_count: usize,
    pub pending_pods: usize,
    /// Hourly price of the remaining nodes.
    pub cluster_cost: f64,
    pub stats: ConsolidationStats,
}

impl SimulationResults {
    pub fn save(&self, path: &str) -> Result<(), Error> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()
    }
}
