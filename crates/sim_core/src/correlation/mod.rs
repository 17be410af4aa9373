//! Correlation engine: specification, PSD repair, factorisation and copulas.
//!
//! ## Pipeline
//!
//! 1. [`CorrelationSpec::resolve`] expands a specification into a full
//!    [`CorrelationMatrix`] over the scenario's ordered variables
//!    (estimating from observations when asked to)
//! 2. [`ensure_psd`] checks the smallest eigenvalue and, under
//!    [`PsdPolicy::Project`], clips and renormalises
//! 3. [`cholesky_lower`] factorises, retrying singular matrices with jitter
//! 4. [`CorrelationModel`] bundles the factor with a [`Copula`] and produces
//!    dependent uniforms for the quantile mapping
//!
//! ## Example
//!
//! ```
//! use sim_core::correlation::{Copula, CorrelationModel, CorrelationPair, CorrelationSpec, PsdPolicy};
//!
//! let names = vec!["demand".to_string(), "price".to_string()];
//! let spec = CorrelationSpec::Pairwise {
//!     pairs: vec![CorrelationPair::new("demand", "price", -0.4)],
//! };
//! let matrix = spec.resolve(&names).unwrap();
//! let model = CorrelationModel::build(matrix, Copula::Gaussian, PsdPolicy::default(), 1e-8).unwrap();
//! assert!(!model.is_projected());
//! assert_eq!(model.dimension(), 2);
//! ```

mod copula;
mod matrix;
mod psd;
mod spec;

pub use copula::{Copula, CorrelationModel};
pub use matrix::{CorrelationMatrix, STRUCTURE_TOLERANCE};
pub use psd::{
    cholesky_lower, ensure_psd, min_eigenvalue, ProjectionDiagnostic, PsdPolicy,
    DEFAULT_EIGENVALUE_FLOOR, PSD_TOLERANCE,
};
pub use spec::{
    average_ranks, pearson, CorrelationPair, CorrelationSpec, EstimationMethod, MIN_OBSERVATIONS,
};
