//! Shared value types.
//!
//! - [`ValidationError`], [`NumericalError`], [`CorrelationError`]: error
//!   types raised by the foundation layer
//! - [`SampleMatrix`]: column-per-variable storage of raw simulation output

pub mod error;
pub mod samples;

pub use error::{CorrelationError, NumericalError, ValidationError};
pub use samples::SampleMatrix;
