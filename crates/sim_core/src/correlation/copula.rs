//! Copulas and the compiled correlation model used inside batches.

use super::matrix::CorrelationMatrix;
use super::psd::{cholesky_lower, ensure_psd, ProjectionDiagnostic, PsdPolicy};
use crate::distributions::special::{clamp_probability, std_normal_cdf};
use crate::types::{CorrelationError, ValidationError};
use rand::Rng;
use rand_distr::{ChiSquared, Distribution as _, StandardNormal};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Dependence structure joining the marginals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Copula {
    /// Φ applied to correlated standard normals.
    #[default]
    Gaussian,
    /// Student-t copula; heavier joint tails than Gaussian.
    StudentT {
        /// Degrees of freedom ν (> 0)
        degrees_of_freedom: f64,
    },
}

impl Copula {
    /// Checks the copula parameters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match *self {
            Self::Gaussian => Ok(()),
            Self::StudentT { degrees_of_freedom } => {
                if degrees_of_freedom.is_finite() && degrees_of_freedom > 0.0 {
                    Ok(())
                } else {
                    Err(ValidationError::parameter(
                        "student_t",
                        "degrees_of_freedom",
                        format!("must be positive, got {}", degrees_of_freedom),
                    ))
                }
            }
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            Self::Gaussian => "gaussian",
            Self::StudentT { .. } => "student_t",
        }
    }
}

#[derive(Clone, Debug)]
struct StudentKernel {
    mixing: ChiSquared<f64>,
    cdf: StudentsT,
    dof: f64,
}

/// Correlation structure compiled once per run and shared read-only by
/// every batch.
///
/// Holds the effective (possibly projected) matrix, its lower Cholesky
/// factor and the copula. [`sample_uniforms`](Self::sample_uniforms) turns
/// independent draws into one row of dependent uniforms.
///
/// # Examples
///
/// ```rust
/// use sim_core::correlation::{Copula, CorrelationMatrix, CorrelationModel, PsdPolicy};
/// use sim_core::rng::SimRng;
///
/// let matrix = CorrelationMatrix::from_rows(
///     vec!["a".into(), "b".into()],
///     vec![vec![1.0, 0.8], vec![0.8, 1.0]],
/// )
/// .unwrap();
/// let model = CorrelationModel::build(matrix, Copula::Gaussian, PsdPolicy::Project, 1e-8).unwrap();
///
/// let mut rng = SimRng::from_seed(1);
/// let mut scratch = vec![0.0; 2];
/// let mut u = vec![0.0; 2];
/// model.sample_uniforms(&mut rng, &mut scratch, &mut u);
/// assert!(u.iter().all(|x| *x > 0.0 && *x < 1.0));
/// ```
#[derive(Clone, Debug)]
pub struct CorrelationModel {
    matrix: CorrelationMatrix,
    lower: Vec<f64>,
    copula: Copula,
    student: Option<StudentKernel>,
    diagnostic: Option<ProjectionDiagnostic>,
    independent: bool,
    descriptor: String,
}

impl CorrelationModel {
    /// Checks PSD (repairing per `policy`), factorises and compiles the copula.
    ///
    /// # Errors
    ///
    /// `CorrelationError::Validation` for an invalid copula, an invalid
    /// matrix or a rejected non-PSD matrix; `CorrelationError::Numerical` if
    /// the factorisation fails.
    pub fn build(
        matrix: CorrelationMatrix,
        copula: Copula,
        policy: PsdPolicy,
        eigenvalue_floor: f64,
    ) -> Result<Self, CorrelationError> {
        copula.validate()?;
        matrix.validate()?;
        let (matrix, diagnostic) = ensure_psd(matrix, policy, eigenvalue_floor)?;
        let lower = cholesky_lower(&matrix)?;

        let student = match copula {
            Copula::Gaussian => None,
            Copula::StudentT { degrees_of_freedom } => {
                let invalid = |e: String| {
                    ValidationError::parameter("student_t", "degrees_of_freedom", e)
                };
                Some(StudentKernel {
                    mixing: ChiSquared::new(degrees_of_freedom)
                        .map_err(|e| invalid(e.to_string()))?,
                    cdf: StudentsT::new(0.0, 1.0, degrees_of_freedom)
                        .map_err(|e| invalid(e.to_string()))?,
                    dof: degrees_of_freedom,
                })
            }
        };

        let independent = matrix.is_identity() && student.is_none();
        let descriptor = describe(&matrix, &copula);
        tracing::debug!(
            dimension = matrix.dimension(),
            copula = copula.tag(),
            projected = diagnostic.is_some(),
            independent,
            "compiled correlation model"
        );

        Ok(Self {
            matrix,
            lower,
            copula,
            student,
            diagnostic,
            independent,
            descriptor,
        })
    }

    /// Independent Gaussian model over `names`.
    pub fn independent(names: Vec<String>) -> Self {
        let n = names.len();
        let matrix = CorrelationMatrix::identity(names);
        let lower = matrix.as_slice().to_vec();
        let descriptor = describe(&matrix, &Copula::Gaussian);
        debug_assert_eq!(lower.len(), n * n);
        Self {
            matrix,
            lower,
            copula: Copula::Gaussian,
            student: None,
            diagnostic: None,
            independent: true,
            descriptor,
        }
    }

    /// Number of variables.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.matrix.dimension()
    }

    /// Effective matrix after any projection.
    #[inline]
    pub fn matrix(&self) -> &CorrelationMatrix {
        &self.matrix
    }

    /// Copula in use.
    #[inline]
    pub fn copula(&self) -> Copula {
        self.copula
    }

    /// Whether the matrix had to be projected to PSD.
    #[inline]
    pub fn is_projected(&self) -> bool {
        self.diagnostic.is_some()
    }

    /// Projection record, if any.
    #[inline]
    pub fn diagnostic(&self) -> Option<&ProjectionDiagnostic> {
        self.diagnostic.as_ref()
    }

    /// Whether variables can be drawn directly from their marginals.
    #[inline]
    pub fn is_independent(&self) -> bool {
        self.independent
    }

    /// Blake3 digest of the effective matrix and copula.
    #[inline]
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Writes correlated standard normals `L·ε` into `out`.
    ///
    /// `scratch` and `out` must both have length [`dimension`](Self::dimension).
    pub fn correlated_normals<R: Rng + ?Sized>(&self, rng: &mut R, scratch: &mut [f64], out: &mut [f64]) {
        let n = self.dimension();
        debug_assert_eq!(scratch.len(), n);
        debug_assert_eq!(out.len(), n);
        for eps in scratch.iter_mut() {
            *eps = StandardNormal.sample(rng);
        }
        for i in 0..n {
            let row = &self.lower[i * n..i * n + i + 1];
            out[i] = row.iter().zip(&scratch[..=i]).map(|(l, e)| l * e).sum();
        }
    }

    /// Writes one row of dependent uniforms into `out`.
    ///
    /// Uniforms are clamped into `(1e-12, 1 − 1e-12)` so they can be passed
    /// straight to any quantile function.
    pub fn sample_uniforms<R: Rng + ?Sized>(&self, rng: &mut R, scratch: &mut [f64], out: &mut [f64]) {
        self.correlated_normals(rng, scratch, out);
        match &self.student {
            None => {
                for z in out.iter_mut() {
                    *z = clamp_probability(std_normal_cdf(*z));
                }
            }
            Some(kernel) => {
                let w: f64 = kernel.mixing.sample(rng);
                let scale = (w / kernel.dof).sqrt();
                for z in out.iter_mut() {
                    *z = clamp_probability(kernel.cdf.cdf(*z / scale));
                }
            }
        }
    }
}

fn describe(matrix: &CorrelationMatrix, copula: &Copula) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(copula.tag().as_bytes());
    if let Copula::StudentT { degrees_of_freedom } = copula {
        hasher.update(&degrees_of_freedom.to_bits().to_le_bytes());
    }
    for name in matrix.names() {
        hasher.update(name.as_bytes());
        hasher.update(&[0u8]);
    }
    for value in matrix.as_slice() {
        hasher.update(&value.to_bits().to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::spec::pearson;
    use crate::rng::SimRng;

    fn pair(rho: f64) -> CorrelationMatrix {
        CorrelationMatrix::from_rows(
            vec!["a".into(), "b".into()],
            vec![vec![1.0, rho], vec![rho, 1.0]],
        )
        .unwrap()
    }

    fn draw(model: &CorrelationModel, n: usize, seed: u64) -> (Vec<f64>, Vec<f64>) {
        let mut rng = SimRng::from_seed(seed);
        let mut scratch = vec![0.0; 2];
        let mut row = vec![0.0; 2];
        let (mut a, mut b) = (Vec::with_capacity(n), Vec::with_capacity(n));
        for _ in 0..n {
            model.correlated_normals(&mut rng, &mut scratch, &mut row);
            a.push(row[0]);
            b.push(row[1]);
        }
        (a, b)
    }

    #[test]
    fn test_correlated_normals_match_target() {
        let model = CorrelationModel::build(pair(0.7), Copula::Gaussian, PsdPolicy::Strict, 1e-8).unwrap();
        let (a, b) = draw(&model, 50_000, 3);
        let r = pearson(&a, &b).unwrap();
        assert!((r - 0.7).abs() < 0.02, "empirical {}", r);
    }

    #[test]
    fn test_student_t_uniforms_in_open_interval() {
        let model = CorrelationModel::build(
            pair(-0.5),
            Copula::StudentT { degrees_of_freedom: 4.0 },
            PsdPolicy::Strict,
            1e-8,
        )
        .unwrap();
        assert!(!model.is_independent());
        let mut rng = SimRng::from_seed(11);
        let mut scratch = vec![0.0; 2];
        let mut u = vec![0.0; 2];
        for _ in 0..10_000 {
            model.sample_uniforms(&mut rng, &mut scratch, &mut u);
            assert!(u.iter().all(|x| *x > 0.0 && *x < 1.0));
        }
    }

    #[test]
    fn test_rejects_bad_degrees_of_freedom() {
        let result = CorrelationModel::build(
            pair(0.1),
            Copula::StudentT { degrees_of_freedom: 0.0 },
            PsdPolicy::Project,
            1e-8,
        );
        assert!(matches!(result, Err(CorrelationError::Validation(_))));
    }

    #[test]
    fn test_identity_gaussian_is_independent() {
        let model = CorrelationModel::build(
            CorrelationMatrix::identity(vec!["x".into(), "y".into()]),
            Copula::Gaussian,
            PsdPolicy::Strict,
            1e-8,
        )
        .unwrap();
        assert!(model.is_independent());
        assert_eq!(
            model.descriptor(),
            CorrelationModel::independent(vec!["x".into(), "y".into()]).descriptor()
        );
    }

    #[test]
    fn test_descriptor_distinguishes_copulas() {
        let g = CorrelationModel::build(pair(0.3), Copula::Gaussian, PsdPolicy::Strict, 1e-8).unwrap();
        let t = CorrelationModel::build(
            pair(0.3),
            Copula::StudentT { degrees_of_freedom: 5.0 },
            PsdPolicy::Strict,
            1e-8,
        )
        .unwrap();
        assert_ne!(g.descriptor(), t.descriptor());
    }

    #[test]
    fn test_copula_serde() {
        let c: Copula = serde_json::from_str(r#"{"type":"student_t","degrees_of_freedom":3}"#).unwrap();
        assert_eq!(c, Copula::StudentT { degrees_of_freedom: 3.0 });
    }
}
