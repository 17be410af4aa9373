//! Scenario construction errors.

use sim_core::types::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

/// Error raised while building a scenario or loading profiles.
///
/// # Examples
/// ```
/// use sim_scenarios::ScenarioError;
///
/// let err = ScenarioError::UnknownProfile("naval".to_string());
/// assert_eq!(err.to_string(), "Unknown domain profile: naval");
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScenarioError {
    /// A variable, correlation, outcome or threshold was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No built-in template has this name.
    #[error("Unknown scenario template: {0}")]
    UnknownTemplate(String),

    /// No catalogued profile has this name.
    #[error("Unknown domain profile: {0}")]
    UnknownProfile(String),

    /// The scenario definition is structurally unusable.
    #[error("Invalid scenario '{scenario}': {reason}")]
    InvalidDefinition {
        /// Scenario name
        scenario: String,
        /// What is wrong
        reason: String,
    },

    /// A profile file could not be read or parsed.
    #[error("Failed to load profiles from {path}: {reason}")]
    ProfileLoad {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        reason: String,
    },

    /// The canonical form of a scenario could not be serialised.
    #[error("Serialisation error: {0}")]
    Serialisation(String),
}

impl ScenarioError {
    /// Creates an invalid definition error.
    pub fn definition(scenario: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            scenario: scenario.into(),
            reason: reason.into(),
        }
    }

    /// Creates a profile load error.
    pub fn profile_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ProfileLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for ScenarioError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialisation(err.to_string())
    }
}
