//! Error types for the risk workbench.

use sim_engine::{ConfigError, SimulationError};
use thiserror::Error;

/// Workbench error type
#[derive(Debug, Error)]
pub enum WorkbenchError {
    /// Engine configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A walkthrough failed outright
    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),

    /// Report could not be rendered
    #[error("Report error: {0}")]
    Report(#[from] serde_json::Error),
}
