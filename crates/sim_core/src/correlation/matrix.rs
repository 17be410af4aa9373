//! Named, row-major correlation matrix.

use crate::types::ValidationError;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Tolerance for symmetry and unit-diagonal checks.
pub const STRUCTURE_TOLERANCE: f64 = 1e-9;

/// Square correlation matrix indexed by variable name.
///
/// Entries are stored row-major. Construction through [`from_rows`](Self::from_rows)
/// validates the structure; [`identity`](Self::identity) is always valid.
///
/// # Examples
///
/// ```rust
/// use sim_core::correlation::CorrelationMatrix;
///
/// let m = CorrelationMatrix::from_rows(
///     vec!["a".into(), "b".into()],
///     vec![vec![1.0, 0.3], vec![0.3, 1.0]],
/// )
/// .unwrap();
/// assert_eq!(m.get(0, 1), 0.3);
/// assert_eq!(m.get_by_name("b", "a"), Some(0.3));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    names: Vec<String>,
    data: Vec<f64>,
}

impl CorrelationMatrix {
    /// Identity over the given names.
    pub fn identity(names: Vec<String>) -> Self {
        let n = names.len();
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Self { names, data }
    }

    /// Builds and validates a matrix from nested rows.
    ///
    /// # Errors
    ///
    /// `ValidationError::InvalidCorrelation` when the rows are not square,
    /// not symmetric, lack a unit diagonal or hold entries outside [-1, 1];
    /// `ValidationError::DuplicateVariable` for repeated names.
    pub fn from_rows(names: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self, ValidationError> {
        let n = names.len();
        if rows.len() != n {
            return Err(ValidationError::correlation(format!(
                "{} rows for {} variables",
                rows.len(),
                n
            )));
        }
        let mut data = Vec::with_capacity(n * n);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n {
                return Err(ValidationError::correlation(format!(
                    "row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    n
                )));
            }
            data.extend(row);
        }
        let matrix = Self { names, data };
        matrix.validate()?;
        Ok(matrix)
    }

    pub(crate) fn from_raw(names: Vec<String>, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), names.len() * names.len());
        Self { names, data }
    }

    /// Checks names, symmetry, diagonal and entry range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let n = self.dimension();
        for (i, name) in self.names.iter().enumerate() {
            if self.names[..i].contains(name) {
                return Err(ValidationError::DuplicateVariable(name.clone()));
            }
        }
        if let Some(pos) = self.data.iter().position(|x| !x.is_finite()) {
            return Err(ValidationError::correlation(format!(
                "non-finite entry {} between '{}' and '{}'",
                self.data[pos],
                self.names[pos / n],
                self.names[pos % n]
            )));
        }
        for i in 0..n {
            let diag = self.get(i, i);
            if (diag - 1.0).abs() > STRUCTURE_TOLERANCE {
                return Err(ValidationError::correlation(format!(
                    "diagonal entry for '{}' is {}, expected 1",
                    self.names[i], diag
                )));
            }
            for j in (i + 1)..n {
                let (a, b) = (self.get(i, j), self.get(j, i));
                if (a - b).abs() > STRUCTURE_TOLERANCE {
                    return Err(ValidationError::correlation(format!(
                        "not symmetric between '{}' and '{}' ({} vs {})",
                        self.names[i], self.names[j], a, b
                    )));
                }
                if a.abs() > 1.0 {
                    return Err(ValidationError::correlation(format!(
                        "entry {} between '{}' and '{}' outside [-1, 1]",
                        a, self.names[i], self.names[j]
                    )));
                }
            }
        }
        Ok(())
    }

    /// Number of variables.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.names.len()
    }

    /// Variable names in matrix order.
    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Entry at `(i, j)`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.dimension() + j]
    }

    /// Entry for a pair of names.
    pub fn get_by_name(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        Some(self.get(i, j))
    }

    /// Sets `(i, j)` and `(j, i)`.
    pub(crate) fn set_symmetric(&mut self, i: usize, j: usize, value: f64) {
        let n = self.dimension();
        self.data[i * n + j] = value;
        self.data[j * n + i] = value;
    }

    /// Whether every off-diagonal entry is zero.
    pub fn is_identity(&self) -> bool {
        let n = self.dimension();
        (0..n).all(|i| (0..n).all(|j| i == j || self.get(i, j) == 0.0))
    }

    /// Row-major entries.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Copies the entries into rows.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        let n = self.dimension();
        self.data.chunks(n.max(1)).take(n).map(<[f64]>::to_vec).collect()
    }

    pub(crate) fn to_dmatrix(&self) -> DMatrix<f64> {
        let n = self.dimension();
        DMatrix::from_row_slice(n, n, &self.data)
    }
}
