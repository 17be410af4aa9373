//! Risk analysis errors.

use thiserror::Error;

/// Error raised by the risk analyzer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    /// The sample matrix has no rows.
    #[error("No samples to analyse")]
    EmptySamples,

    /// A required column is absent from the sample matrix.
    #[error("Column '{0}' is missing from the samples")]
    MissingColumn(String),

    /// VaR confidence outside (0, 1).
    #[error("VaR confidence must lie in (0, 1), got {0}")]
    InvalidConfidence(f64),
}
