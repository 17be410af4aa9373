//! Error types for simulation runs, configuration and caching.
//!
//! Every run-level [`SimulationError`] carries a [`RunContext`] naming the
//! scenario, its content hash and the seed, so a failed run can be replayed
//! exactly.

use crate::result::SimulationResult;
use sim_scenarios::ScenarioError;
use std::fmt;
use thiserror::Error;

/// Identifies a run for diagnostics and replay.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunContext {
    /// Run identifier within the engine
    pub run_id: u64,
    /// Scenario name
    pub scenario: String,
    /// Scenario content hash
    pub scenario_hash: String,
    /// Master seed
    pub seed: u64,
}

impl fmt::Display for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scenario_hash.is_empty() {
            return write!(f, "run {} (scenario unresolved)", self.run_id);
        }
        let hash = &self.scenario_hash[..self.scenario_hash.len().min(12)];
        write!(
            f,
            "run {} scenario '{}' [{}] seed {}",
            self.run_id, self.scenario, hash, self.seed
        )
    }
}

/// Errors raised by a simulation run.
#[derive(Error, Debug)]
pub enum SimulationError {
    /// The scenario or run parameters were rejected before any work started.
    #[error("Validation failed for {context}: {source}")]
    Validation {
        /// Run context
        context: RunContext,
        /// Underlying problem
        #[source]
        source: ScenarioError,
    },

    /// Sampling or analysis failed on validated inputs.
    #[error("Computation failed for {context}{}: {message}", locate(.batch, .variable))]
    Computation {
        /// Run context
        context: RunContext,
        /// Failing batch, if attributable
        batch: Option<usize>,
        /// Failing variable, if attributable
        variable: Option<String>,
        /// What went wrong
        message: String,
    },

    /// The run would exceed a resource limit.
    #[error("Resource limit exceeded for {context}: {message}")]
    Resource {
        /// Run context
        context: RunContext,
        /// Which limit
        message: String,
    },

    /// The wall-clock budget expired.
    #[error("Timed out for {context} after {completed_batches}/{total_batches} batches")]
    Timeout {
        /// Run context
        context: RunContext,
        /// Batches finished before expiry
        completed_batches: usize,
        /// Batches planned
        total_batches: usize,
        /// Result over the completed batches, when the interrupt policy
        /// returns partial results
        partial: Option<Box<SimulationResult>>,
    },

    /// The run was cancelled through its token.
    #[error("Cancelled {context} after {completed_batches}/{total_batches} batches")]
    Cancelled {
        /// Run context
        context: RunContext,
        /// Batches finished before cancellation
        completed_batches: usize,
        /// Batches planned
        total_batches: usize,
    },
}

fn locate(batch: &Option<usize>, variable: &Option<String>) -> String {
    match (batch, variable) {
        (Some(b), Some(v)) => format!(" (batch {}, variable '{}')", b, v),
        (Some(b), None) => format!(" (batch {})", b),
        (None, Some(v)) => format!(" (variable '{}')", v),
        (None, None) => String::new(),
    }
}

impl SimulationError {
    /// Creates a validation error.
    pub fn validation(context: RunContext, source: impl Into<ScenarioError>) -> Self {
        Self::Validation {
            context,
            source: source.into(),
        }
    }

    /// Creates a computation error.
    pub fn computation(
        context: RunContext,
        batch: Option<usize>,
        variable: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Computation {
            context,
            batch,
            variable,
            message: message.into(),
        }
    }

    /// Creates a resource error.
    pub fn resource(context: RunContext, message: impl Into<String>) -> Self {
        Self::Resource {
            context,
            message: message.into(),
        }
    }

    /// Run context of the failing run.
    pub fn context(&self) -> &RunContext {
        match self {
            Self::Validation { context, .. }
            | Self::Computation { context, .. }
            | Self::Resource { context, .. }
            | Self::Timeout { context, .. }
            | Self::Cancelled { context, .. } => context,
        }
    }

    /// Partial result attached to a timeout, if any.
    pub fn partial_result(&self) -> Option<&SimulationResult> {
        match self {
            Self::Timeout { partial, .. } => partial.as_deref(),
            _ => None,
        }
    }

    /// Whether the run stopped part-way through (timeout or cancellation).
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Cancelled { .. })
    }
}

/// Configuration loading error.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("IO error: {0}")]
    Io(String),

    /// The file is not valid TOML for the configuration.
    #[error("Parse error: {0}")]
    Parse(String),

    /// One or more settings are out of range.
    #[error("Validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// The profile file named by the configuration could not be loaded.
    #[error("Profile catalogue error: {0}")]
    Profiles(#[from] ScenarioError),

    /// The worker pool could not be created.
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

/// Result cache failure. Logged at `warn` by the engine and never surfaced
/// to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The backend refused the operation.
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// The cached entry could not be used.
    #[error("Corrupt cache entry for key {0}")]
    Corrupt(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::types::ValidationError;

    fn ctx() -> RunContext {
        RunContext {
            run_id: 3,
            scenario: "supply_chain".into(),
            scenario_hash: "0123456789abcdef0123".into(),
            seed: 42,
        }
    }

    #[test]
    fn test_context_display() {
        assert_eq!(
            ctx().to_string(),
            "run 3 scenario 'supply_chain' [0123456789ab] seed 42"
        );
        assert_eq!(RunContext::default().to_string(), "run 0 (scenario unresolved)");
    }

    #[test]
    fn test_validation_wraps_scenario_error() {
        let err = SimulationError::validation(ctx(), ValidationError::UnknownVariable("x".into()));
        assert!(err.to_string().contains("Unknown variable: x"));
        assert_eq!(err.context().seed, 42);
        assert!(!err.is_interrupted());
    }

    #[test]
    fn test_computation_location() {
        let err = SimulationError::computation(ctx(), Some(4), Some("demand".into()), "non-finite");
        assert!(err.to_string().contains("(batch 4, variable 'demand')"));
        let err = SimulationError::computation(ctx(), None, None, "boom");
        assert!(err.to_string().ends_with(": boom"));
    }

    #[test]
    fn test_config_validation_display() {
        let err = ConfigError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Validation errors: a; b");
    }
}
