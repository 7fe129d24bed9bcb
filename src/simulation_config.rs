//! Simulation configuration.

use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::consolidation::ConsolidationSettings;
use crate::error::ConfigError;
use crate::instance_type::InstanceType;
use crate::placement::PlacementKind;
use crate::pod::PodOwner;

/// Holds configuration of a set of identical nodes.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node pool the nodes belong to.
    #[serde(default = "default_node_pool")]
    pub node_pool: String,
    /// Instance type name, must be present in `instance_types`.
    pub instance_type: String,
    /// Number of such nodes.
    pub count: u32,
}

impl NodeConfig {
    pub fn new(node_pool: &str, instance_type: &str, count: u32) -> Self {
        Self {
            node_pool: node_pool.to_string(),
            instance_type: instance_type.to_string(),
            count,
        }
    }
}

/// Holds configuration of a set of identical pods.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PodConfig {
    pub requested_cpu: f32,
    /// Requested memory in GB.
    pub requested_memory: f64,
    #[serde(default)]
    pub priority_weight: u64,
    /// Pods carrying the do-not-disrupt annotation.
    #[serde(default)]
    pub do_not_disrupt: bool,
    /// Daemon pods are never rescheduled.
    #[serde(default)]
    pub daemon: bool,
    /// Pins the pods to nodes of one node pool.
    #[serde(default)]
    pub node_pool_selector: Option<String>,
    /// Submit time (in simulation time, seconds from start of simulation).
    #[serde(default)]
    pub submit_time: f64,
    /// Number of such pods.
    pub count: u32,
}

impl PodConfig {
    pub fn new(requested_cpu: f32, requested_memory: f64, priority_weight: u64, submit_time: f64, count: u32) -> Self {
        Self {
            requested_cpu,
            requested_memory,
            priority_weight,
            do_not_disrupt: false,
            daemon: false,
            node_pool_selector: None,
            submit_time,
            count,
        }
    }

    pub fn owner(&self, deployment_id: u64) -> PodOwner {
        if self.daemon {
            PodOwner::DaemonSet
        } else {
            PodOwner::Deployment(deployment_id)
        }
    }
}

/// Random workload churn: every `interval` seconds, with probability `rate`, a small pod is
/// submitted or one previously submitted churn pod is deleted.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ChurnConfig {
    pub interval: f64,
    pub rate: f64,
    pub requested_cpu: f32,
    pub requested_memory: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

/// Max nodes of a node pool disrupted by a single command.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DisruptionBudgetConfig {
    pub node_pool: String,
    pub nodes: usize,
}

fn default_node_pool() -> String {
    "default".to_string()
}

fn default_seed() -> u64 {
    42
}

/// Holds raw simulation config parsed from YAML file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
struct RawSimulationConfig {
    pub scan_interval: Option<f64>,
    pub command_execution_delay: Option<f64>,
    pub node_provisioning_delay: Option<f64>,
    pub consolidated_ttl: Option<f64>,
    pub single_node_timeout: Option<f64>,
    pub multi_node_timeout: Option<f64>,
    pub multi_node_max_candidates: Option<usize>,
    pub default_disruption_budget: Option<usize>,
    pub disruption_budgets: Option<Vec<DisruptionBudgetConfig>>,
    pub validate_command_generation: Option<bool>,
    pub placement: Option<PlacementKind>,
    pub instance_types: Option<Vec<InstanceType>>,
    pub nodes: Option<Vec<NodeConfig>>,
    pub pods: Option<Vec<PodConfig>>,
    pub churn: Option<ChurnConfig>,
}

/// Represents simulation configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Period of the consolidation reconciliation loop in seconds.
    pub scan_interval: f64,
    /// Time to drain and terminate the nodes of a command in seconds.
    pub command_execution_delay: f64,
    /// Time for a replacement node to become ready in seconds.
    pub node_provisioning_delay: f64,
    /// Seconds after which a consolidated mark expires by itself.
    pub consolidated_ttl: Option<f64>,
    /// Wall clock limit of a single node planning pass in seconds.
    pub single_node_timeout: Option<f64>,
    /// Wall clock limit of a multi node planning pass in seconds.
    pub multi_node_timeout: Option<f64>,
    /// Max nodes considered together by multi node consolidation.
    pub multi_node_max_candidates: usize,
    /// Disruption budget of node pools without an explicit one.
    pub default_disruption_budget: usize,
    pub disruption_budgets: Vec<DisruptionBudgetConfig>,
    /// Reject commands planned against an older cluster generation.
    pub validate_command_generation: bool,
    pub placement: PlacementKind,
    pub instance_types: Vec<InstanceType>,
    /// Configurations of nodes.
    pub nodes: Vec<NodeConfig>,
    /// Configurations of pods.
    pub pods: Vec<PodConfig>,
    pub churn: Option<ChurnConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            scan_interval: 10.0,
            command_execution_delay: 30.0,
            node_provisioning_delay: 60.0,
            consolidated_ttl: None,
            single_node_timeout: Some(180.0),
            multi_node_timeout: Some(60.0),
            multi_node_max_candidates: 100,
            default_disruption_budget: 10,
            disruption_budgets: Vec::default(),
            validate_command_generation: false,
            placement: PlacementKind::default(),
            instance_types: Vec::default(),
            nodes: Vec::default(),
            pods: Vec::default(),
            churn: None,
        }
    }
}

impl SimulationConfig {
    pub fn new(instance_types: Vec<InstanceType>) -> Self {
        Self {
            instance_types,
            ..Default::default()
        }
    }

    pub fn from_file(file_name: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(file_name).map_err(|source| ConfigError::Io {
            path: file_name.to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let raw: RawSimulationConfig = serde_yaml::from_str(content)?;
        let default = Self::default();

        let config = Self {
            scan_interval: raw.scan_interval.unwrap_or(default.scan_interval),
            command_execution_delay: raw.command_execution_delay.unwrap_or(default.command_execution_delay),
            node_provisioning_delay: raw.node_provisioning_delay.unwrap_or(default.node_provisioning_delay),
            consolidated_ttl: raw.consolidated_ttl,
            single_node_timeout: raw.single_node_timeout.or(default.single_node_timeout),
            multi_node_timeout: raw.multi_node_timeout.or(default.multi_node_timeout),
            multi_node_max_candidates: raw.multi_node_max_candidates.unwrap_or(default.multi_node_max_candidates),
            default_disruption_budget: raw.default_disruption_budget.unwrap_or(default.default_disruption_budget),
            disruption_budgets: raw.disruption_budgets.unwrap_or_default(),
            validate_command_generation: raw.validate_command_generation
                .unwrap_or(default.validate_command_generation),
            placement: raw.placement.unwrap_or_default(),
            instance_types: raw.instance_types.unwrap_or_default(),
            nodes: raw.nodes.unwrap_or_default(),
            pods: raw.pods.unwrap_or_default(),
            churn: raw.churn,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.scan_interval.is_finite() && self.scan_interval > 0.0) {
            return Err(ConfigError::Invalid("scan_interval must be positive".to_string()));
        }
        let delays = [
            ("command_execution_delay", Some(self.command_execution_delay)),
            ("node_provisioning_delay", Some(self.node_provisioning_delay)),
            ("consolidated_ttl", self.consolidated_ttl),
            ("single_node_timeout", self.single_node_timeout),
            ("multi_node_timeout", self.multi_node_timeout),
        ];
        for (name, value) in delays {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    return Err(ConfigError::Invalid(format!("{} must be a non-negative number, got {}", name, value)));
                }
            }
        }
        if self.multi_node_max_candidates == 0 {
            return Err(ConfigError::Invalid("multi_node_max_candidates must be positive".to_string()));
        }
        for node in &self.nodes {
            if !self.instance_types.iter().any(|it| it.name == node.instance_type) {
                return Err(ConfigError::Invalid(format!("unknown instance type {}", node.instance_type)));
            }
        }
        for pod in &self.pods {
            if !pod.submit_time.is_finite() || pod.submit_time < 0.0 {
                return Err(ConfigError::Invalid(format!("pod submit_time must be non-negative, got {}",
                                                        pod.submit_time)));
            }
        }
        if let Some(churn) = &self.churn {
            if !(churn.interval.is_finite() && churn.interval > 0.0) || !(0.0..=1.0).contains(&churn.rate) {
                return Err(ConfigError::Invalid("churn needs a positive interval and a rate in [0, 1]".to_string()));
            }
        }
        Ok(())
    }

    pub fn consolidation_settings(&self) -> Result<ConsolidationSettings, ConfigError> {
        Ok(ConsolidationSettings {
            single_node_timeout: timeout("single_node_timeout", self.single_node_timeout)?,
            multi_node_timeout: timeout("multi_node_timeout", self.multi_node_timeout)?,
            multi_node_max_candidates: self.multi_node_max_candidates,
        })
    }

    /// Overrides the churn seed, if churn is configured.
    pub fn with_churn_seed(mut self, seed: u64) -> Self {
        if let Some(churn) = self.churn.as_mut() {
            churn.seed = seed;
        }
        self
    }
}

fn timeout(name: &str, seconds: Option<f64>) -> Result<Option<Duration>, ConfigError> {
    seconds.map(Duration::try_from_secs_f64)
        .transpose()
        .map_err(|e| ConfigError::Invalid(format!("{}: {}", name, e)))
}
