//! Error types for structured error handling.
//!
//! This module provides:
//! - `ValidationError`: rejected inputs (parameters, matrices, names)
//! - `NumericalError`: numerical failures on inputs that passed validation
//! - `CorrelationError`: either of the above, raised while compiling a
//!   correlation structure

use thiserror::Error;

/// Rejected input, reported before any sampling or decomposition starts.
///
/// # Examples
/// ```
/// use sim_core::types::ValidationError;
///
/// let err = ValidationError::parameter("normal", "std_dev", "must be positive, got -1");
/// assert_eq!(
///     format!("{}", err),
///     "Invalid parameter 'std_dev' for normal: must be positive, got -1"
/// );
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A distribution parameter lies outside the family's support.
    #[error("Invalid parameter '{name}' for {family}: {reason}")]
    InvalidParameter {
        /// Family name (e.g. "gamma")
        family: &'static str,
        /// Parameter name (e.g. "shape")
        name: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// A family name could not be resolved.
    #[error("Unknown distribution family: {0}")]
    UnknownFamily(String),

    /// A parameter key does not exist for the family.
    #[error("Parameter '{param}' is not defined for {family}")]
    UnsupportedParameter {
        /// Family name
        family: &'static str,
        /// Requested parameter
        param: &'static str,
    },

    /// Structural problem with a correlation matrix.
    #[error("Invalid correlation matrix: {0}")]
    InvalidCorrelation(String),

    /// Correlation matrix rejected by the strict PSD policy.
    #[error("Correlation matrix is not positive semi-definite (min eigenvalue {min_eigenvalue:.3e})")]
    NotPositiveSemiDefinite {
        /// Smallest eigenvalue of the offending matrix
        min_eigenvalue: f64,
    },

    /// A name does not refer to a known variable or column.
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// A name is used twice where names must be unique.
    #[error("Duplicate variable: {0}")]
    DuplicateVariable(String),

    /// Not enough historical observations to estimate a correlation.
    #[error("Insufficient observations: got {got}, need at least {need}")]
    InsufficientObservations {
        /// Number of observations supplied
        got: usize,
        /// Minimum required
        need: usize,
    },

    /// Any other rejected value.
    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue {
        /// Field name
        name: String,
        /// Why the value was rejected
        reason: String,
    },
}

impl ValidationError {
    /// Creates an invalid distribution parameter error.
    pub fn parameter(family: &'static str, name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            family,
            name,
            reason: reason.into(),
        }
    }

    /// Creates a correlation structure error.
    pub fn correlation(reason: impl Into<String>) -> Self {
        Self::InvalidCorrelation(reason.into())
    }

    /// Creates a generic invalid value error.
    pub fn value(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Numerical failure on inputs that passed validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NumericalError {
    /// Cholesky factorisation failed, even after projection and jitter.
    #[error("Cholesky decomposition failed: {0}")]
    DecompositionFailed(String),

    /// A sample or derived value was NaN or infinite.
    #[error("Non-finite value {value} produced for '{variable}'")]
    NonFinite {
        /// Variable or column name
        variable: String,
        /// Offending value
        value: f64,
    },
}

/// Error raised while compiling a correlation structure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CorrelationError {
    /// The specification or matrix was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The matrix was accepted but could not be factorised.
    #[error(transparent)]
    Numerical(#[from] NumericalError),
}
