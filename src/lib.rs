//! Consolidation decision engine of a cluster autoscaler, with a discrete-event simulation of
//! the cluster around it.

/// Cluster staleness tracking.
pub mod staleness;
pub mod node;
pub mod pod;
pub mod snapshot;
pub mod cluster_state;
pub mod command;
pub mod context;
pub mod candidate;
pub mod instance_type;
pub mod placement;
/// Command planning shared by all consolidation modes.
pub mod planner;
pub mod single_node;
pub mod multi_node;
pub mod consolidation;
pub mod disruption_controller;
pub mod executor;
pub mod churn;
pub mod events;
pub mod error;
pub mod logger;
pub mod simulation;
pub mod simulation_config;
pub mod simulation_metrics;
