//! Positive semi-definiteness checks, eigenvalue-clipping repair and
//! Cholesky factorisation.

use super::matrix::CorrelationMatrix;
use crate::types::{NumericalError, ValidationError};
use nalgebra::{Cholesky, DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};

/// Smallest eigenvalue still treated as non-negative.
pub const PSD_TOLERANCE: f64 = -1e-10;

/// Default floor for clipped eigenvalues.
pub const DEFAULT_EIGENVALUE_FLOOR: f64 = 1e-8;

/// Diagonal jitter attempted, in order, when factorising a singular matrix.
const JITTER_LADDER: [f64; 3] = [1e-10, 1e-9, 1e-8];

/// What to do with a matrix that is not positive semi-definite.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PsdPolicy {
    /// Clip eigenvalues to a floor and renormalise to the nearest valid
    /// correlation matrix.
    #[default]
    Project,
    /// Reject the matrix.
    Strict,
}

/// Record of a PSD repair.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectionDiagnostic {
    /// Smallest eigenvalue of the matrix before repair
    pub min_eigenvalue: f64,
    /// Floor the eigenvalues were clipped to
    pub floor: f64,
    /// Largest absolute change to any entry
    pub max_adjustment: f64,
}

/// Smallest eigenvalue of a symmetric matrix.
pub fn min_eigenvalue(matrix: &CorrelationMatrix) -> f64 {
    if matrix.dimension() == 0 {
        return 1.0;
    }
    SymmetricEigen::new(matrix.to_dmatrix())
        .eigenvalues
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min)
}

/// Returns a PSD version of `matrix` according to `policy`.
///
/// PSD inputs are returned unchanged with no diagnostic.
///
/// # Errors
///
/// `ValidationError::NotPositiveSemiDefinite` under [`PsdPolicy::Strict`];
/// `ValidationError::InvalidValue` for a floor that is not positive.
///
/// # Examples
///
/// ```rust
/// use sim_core::correlation::{ensure_psd, CorrelationMatrix, PsdPolicy};
///
/// // Pairwise-consistent but jointly impossible
/// let m = CorrelationMatrix::from_rows(
///     vec!["a".into(), "b".into(), "c".into()],
///     vec![
///         vec![1.0, 0.9, -0.9],
///         vec![0.9, 1.0, 0.9],
///         vec![-0.9, 0.9, 1.0],
///     ],
/// )
/// .unwrap();
///
/// assert!(ensure_psd(m.clone(), PsdPolicy::Strict, 1e-8).is_err());
///
/// let (repaired, diagnostic) = ensure_psd(m, PsdPolicy::Project, 1e-8).unwrap();
/// assert!(diagnostic.unwrap().min_eigenvalue < 0.0);
/// assert!((repaired.get(1, 1) - 1.0).abs() < 1e-12);
/// ```
pub fn ensure_psd(
    matrix: CorrelationMatrix,
    policy: PsdPolicy,
    floor: f64,
) -> Result<(CorrelationMatrix, Option<ProjectionDiagnostic>), ValidationError> {
    if !(floor.is_finite() && floor > 0.0) {
        return Err(ValidationError::value(
            "eigenvalue_floor",
            format!("must be positive, got {}", floor),
        ));
    }
    let min_eigenvalue = min_eigenvalue(&matrix);
    if min_eigenvalue >= PSD_TOLERANCE {
        return Ok((matrix, None));
    }
    match policy {
        PsdPolicy::Strict => Err(ValidationError::NotPositiveSemiDefinite { min_eigenvalue }),
        PsdPolicy::Project => {
            let projected = project(&matrix, floor);
            let max_adjustment = matrix
                .as_slice()
                .iter()
                .zip(projected.as_slice())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            tracing::warn!(
                min_eigenvalue,
                floor,
                max_adjustment,
                "correlation matrix was not PSD; projected to nearest valid matrix"
            );
            Ok((
                projected,
                Some(ProjectionDiagnostic {
                    min_eigenvalue,
                    floor,
                    max_adjustment,
                }),
            ))
        }
    }
}

/// Eigenvalue clipping followed by unit-diagonal renormalisation.
fn project(matrix: &CorrelationMatrix, floor: f64) -> CorrelationMatrix {
    let n = matrix.dimension();
    let eigen = SymmetricEigen::new(matrix.to_dmatrix());
    let clipped = eigen.eigenvalues.map(|v| v.max(floor));
    let v = &eigen.eigenvectors;
    let rebuilt: DMatrix<f64> = v * DMatrix::from_diagonal(&clipped) * v.transpose();

    let scale: Vec<f64> = (0..n).map(|i| rebuilt[(i, i)].sqrt()).collect();
    let mut data = vec![0.0; n * n];
    for i in 0..n {
        data[i * n + i] = 1.0;
        for j in (i + 1)..n {
            let a = rebuilt[(i, j)] / (scale[i] * scale[j]);
            let b = rebuilt[(j, i)] / (scale[i] * scale[j]);
            let value = (0.5 * (a + b)).clamp(-1.0, 1.0);
            data[i * n + j] = value;
            data[j * n + i] = value;
        }
    }
    CorrelationMatrix::from_raw(matrix.names().to_vec(), data)
}

/// Lower-triangular Cholesky factor, row-major.
///
/// A singular but PSD matrix (for example two perfectly correlated
/// variables) is retried with a small diagonal jitter.
///
/// # Errors
///
/// `NumericalError::DecompositionFailed` if the factorisation fails even
/// with the largest jitter.
pub fn cholesky_lower(matrix: &CorrelationMatrix) -> Result<Vec<f64>, NumericalError> {
    let n = matrix.dimension();
    if n == 0 {
        return Ok(Vec::new());
    }
    let base = matrix.to_dmatrix();
    if let Some(chol) = Cholesky::new(base.clone()) {
        return Ok(row_major(&chol.l(), n));
    }
    for jitter in JITTER_LADDER {
        let mut jittered = base.clone();
        for i in 0..n {
            jittered[(i, i)] += jitter;
        }
        if let Some(chol) = Cholesky::new(jittered) {
            tracing::debug!(jitter, dimension = n, "cholesky succeeded after diagonal jitter");
            return Ok(row_major(&chol.l(), n));
        }
    }
    Err(NumericalError::DecompositionFailed(format!(
        "{}x{} matrix is not positive definite even with jitter {:e}",
        n,
        n,
        JITTER_LADDER[JITTER_LADDER.len() - 1]
    )))
}

fn row_major(l: &DMatrix<f64>, n: usize) -> Vec<f64> {
    let mut out = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            out[i * n + j] = l[(i, j)];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn matrix(rows: Vec<Vec<f64>>) -> CorrelationMatrix {
        let names = (0..rows.len()).map(|i| format!("v{}", i)).collect();
        CorrelationMatrix::from_rows(names, rows).unwrap()
    }

    fn infeasible() -> CorrelationMatrix {
        matrix(vec![
            vec![1.0, 0.9, -0.9],
            vec![0.9, 1.0, 0.9],
            vec![-0.9, 0.9, 1.0],
        ])
    }

    #[test]
    fn test_psd_matrix_is_untouched() {
        let m = matrix(vec![vec![1.0, 0.5], vec![0.5, 1.0]]);
        let (out, diagnostic) = ensure_psd(m.clone(), PsdPolicy::Project, DEFAULT_EIGENVALUE_FLOOR).unwrap();
        assert_eq!(out, m);
        assert!(diagnostic.is_none());
    }

    #[test]
    fn test_strict_rejects_non_psd() {
        let err = ensure_psd(infeasible(), PsdPolicy::Strict, DEFAULT_EIGENVALUE_FLOOR).unwrap_err();
        assert!(matches!(err, ValidationError::NotPositiveSemiDefinite { min_eigenvalue } if min_eigenvalue < 0.0));
    }

    #[test]
    fn test_projection_yields_valid_psd_matrix() {
        let (out, diagnostic) =
            ensure_psd(infeasible(), PsdPolicy::Project, DEFAULT_EIGENVALUE_FLOOR).unwrap();
        let diagnostic = diagnostic.unwrap();
        assert!(diagnostic.max_adjustment > 0.0);
        assert_eq!(diagnostic.floor, DEFAULT_EIGENVALUE_FLOOR);
        assert!(out.validate().is_ok());
        assert!(min_eigenvalue(&out) >= PSD_TOLERANCE);
        assert!(cholesky_lower(&out).is_ok());
    }

    #[test]
    fn test_rejects_non_positive_floor() {
        assert!(ensure_psd(infeasible(), PsdPolicy::Project, 0.0).is_err());
    }

    #[test]
    fn test_cholesky_reproduces_matrix() {
        let m = matrix(vec![
            vec![1.0, 0.3, 0.2],
            vec![0.3, 1.0, -0.1],
            vec![0.2, -0.1, 1.0],
        ]);
        let l = cholesky_lower(&m).unwrap();
        let n = 3;
        for i in 0..n {
            for j in 0..n {
                let product: f64 = (0..n).map(|k| l[i * n + k] * l[j * n + k]).sum();
                assert_relative_eq!(product, m.get(i, j), epsilon = 1e-12);
            }
            for j in (i + 1)..n {
                assert_eq!(l[i * n + j], 0.0);
            }
        }
    }

    #[test]
    fn test_cholesky_singular_uses_jitter() {
        let m = matrix(vec![vec![1.0, 1.0], vec![1.0, 1.0]]);
        let l = cholesky_lower(&m).unwrap();
        assert_relative_eq!(l[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(l[2], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_empty_matrix() {
        let m = CorrelationMatrix::identity(Vec::new());
        assert_eq!(cholesky_lower(&m).unwrap(), Vec::<f64>::new());
        assert!(ensure_psd(m, PsdPolicy::Strict, DEFAULT_EIGENVALUE_FLOOR).is_ok());
    }
}
