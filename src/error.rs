//! Consolidation errors.

use thiserror::Error;

/// Errors surfaced by command planning.
///
/// A staleness bailout is never an error: it is an empty, successful result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConsolidationError {
    /// The planning context was cancelled by the caller.
    #[error("consolidation planning was cancelled")]
    Cancelled,

    /// The planning context deadline passed before planning finished.
    #[error("consolidation planning exceeded its deadline")]
    DeadlineExceeded,

    /// Pricing or capacity data for an instance type could not be obtained.
    #[error("no pricing data for instance type {instance_type}")]
    Pricing { instance_type: String },

    /// A command or pool referenced a node the snapshot does not know.
    #[error("unknown node {0}")]
    UnknownNode(u32),

    /// A command or node referenced a pod the snapshot does not know.
    #[error("unknown pod {0}")]
    UnknownPod(u64),
}

impl ConsolidationError {
    /// True for "try again soon" errors (cancellation, deadline), false for planning failures.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ConsolidationError::Cancelled | ConsolidationError::DeadlineExceeded)
    }
}

/// Errors raised while loading a simulation configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("can't parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_classification() {
        assert!(ConsolidationError::Cancelled.is_cancellation());
        assert!(ConsolidationError::DeadlineExceeded.is_cancellation());
        assert!(!ConsolidationError::Pricing { instance_type: "m5.large".to_string() }.is_cancellation());
        assert!(!ConsolidationError::UnknownNode(3).is_cancellation());
    }
}
