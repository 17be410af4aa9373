//! Column-per-variable storage for raw simulation output.
//!
//! A [`SampleMatrix`] holds one column per variable (or derived outcome) and
//! one row per iteration. Batches produce their own matrices which the runner
//! concatenates in batch-index order with [`SampleMatrix::concat`].

use super::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw Monte Carlo output: named columns of equal length.
///
/// # Examples
///
/// ```rust
/// use sim_core::types::SampleMatrix;
///
/// let m = SampleMatrix::from_columns(
///     vec!["a".to_string(), "b".to_string()],
///     vec![vec![1.0, 2.0], vec![3.0, 4.0]],
/// )
/// .unwrap();
/// assert_eq!(m.rows(), 2);
/// assert_eq!(m.column("b").unwrap(), &[3.0, 4.0]);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SampleMatrix {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl SampleMatrix {
    /// Creates an empty matrix with the given column names.
    pub fn new(names: Vec<String>) -> Self {
        let columns = vec![Vec::new(); names.len()];
        Self { names, columns }
    }

    /// Creates an empty matrix with room for `rows` rows per column.
    pub fn with_capacity(names: Vec<String>, rows: usize) -> Self {
        let columns = (0..names.len()).map(|_| Vec::with_capacity(rows)).collect();
        Self { names, columns }
    }

    /// Builds a matrix from named columns.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` when the name and column counts differ, a
    /// name repeats, or the columns have different lengths.
    pub fn from_columns(names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self, ValidationError> {
        if names.len() != columns.len() {
            return Err(ValidationError::value(
                "columns",
                format!("{} names for {} columns", names.len(), columns.len()),
            ));
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(ValidationError::DuplicateVariable(name.clone()));
            }
        }
        if let Some(first) = columns.first() {
            if let Some((idx, _)) = columns.iter().enumerate().find(|(_, c)| c.len() != first.len()) {
                return Err(ValidationError::value(
                    names[idx].clone(),
                    format!("column has {} rows, expected {}", columns[idx].len(), first.len()),
                ));
            }
        }
        Ok(Self { names, columns })
    }

    /// Concatenates batch matrices in the order given.
    ///
    /// The caller is responsible for ordering `parts` by batch index; this
    /// function never reorders.
    pub fn concat(names: Vec<String>, parts: impl IntoIterator<Item = SampleMatrix>) -> Self {
        let mut out = Self::new(names);
        for part in parts {
            out.append(part);
        }
        out
    }

    /// Appends the rows of `other`, matching columns by position.
    pub fn append(&mut self, other: SampleMatrix) {
        debug_assert_eq!(self.names, other.names, "column layout mismatch");
        for (dst, src) in self.columns.iter_mut().zip(other.columns) {
            dst.extend(src);
        }
    }

    /// Adds a column.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the name already exists or the length
    /// differs from the existing columns.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<(), ValidationError> {
        let name = name.into();
        if self.names.contains(&name) {
            return Err(ValidationError::DuplicateVariable(name));
        }
        if !self.columns.is_empty() && values.len() != self.rows() {
            return Err(ValidationError::value(
                name,
                format!("column has {} rows, expected {}", values.len(), self.rows()),
            ));
        }
        self.names.push(name);
        self.columns.push(values);
        Ok(())
    }

    /// Number of rows (iterations).
    #[inline]
    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// Number of columns.
    #[inline]
    pub fn n_columns(&self) -> usize {
        self.names.len()
    }

    /// Whether the matrix holds no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }

    /// Column names in storage order.
    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Position of a named column.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Borrows a column by name.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.index_of(name).map(|i| self.columns[i].as_slice())
    }

    /// Borrows a column by position.
    #[inline]
    pub fn column_at(&self, index: usize) -> &[f64] {
        &self.columns[index]
    }

    /// Mutable access to a column by position.
    #[inline]
    pub fn column_at_mut(&mut self, index: usize) -> &mut Vec<f64> {
        &mut self.columns[index]
    }

    /// Iterates over `(name, column)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter().map(Vec::as_slice))
    }

    /// Returns one iteration as a name-to-value map.
    pub fn row(&self, index: usize) -> BTreeMap<String, f64> {
        self.iter()
            .map(|(name, col)| (name.to_string(), col[index]))
            .collect()
    }

    /// Blake3 digest over the names and the exact bit patterns of all values.
    ///
    /// Two matrices share a digest only if they are bit-identical, which
    /// makes the digest a compact stand-in when raw samples are not retained.
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (name, column) in self.iter() {
            hasher.update(name.as_bytes());
            hasher.update(&[0u8]);
            for value in column {
                hasher.update(&value.to_bits().to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Memory needed to hold `rows × columns` samples.
    #[inline]
    pub fn estimated_bytes(rows: usize, columns: usize) -> usize {
        rows.saturating_mul(columns)
            .saturating_mul(std::mem::size_of::<f64>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_concat_preserves_order() {
        let a = SampleMatrix::from_columns(names(&["x"]), vec![vec![1.0, 2.0]]).unwrap();
        let b = SampleMatrix::from_columns(names(&["x"]), vec![vec![3.0]]).unwrap();
        let m = SampleMatrix::concat(names(&["x"]), vec![a, b]);
        assert_eq!(m.column("x").unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_from_columns_rejects_ragged() {
        let result = SampleMatrix::from_columns(names(&["x", "y"]), vec![vec![1.0], vec![1.0, 2.0]]);
        assert!(matches!(result, Err(ValidationError::InvalidValue { .. })));
    }

    #[test]
    fn test_push_column() {
        let mut m = SampleMatrix::from_columns(names(&["x"]), vec![vec![1.0, 2.0]]).unwrap();
        m.push_column("y", vec![3.0, 4.0]).unwrap();
        assert_eq!(m.n_columns(), 2);
        assert!(m.push_column("y", vec![0.0, 0.0]).is_err());
        assert!(m.push_column("z", vec![0.0]).is_err());
    }

    #[test]
    fn test_row_view() {
        let m = SampleMatrix::from_columns(names(&["a", "b"]), vec![vec![1.0, 2.0], vec![5.0, 6.0]])
            .unwrap();
        let row = m.row(1);
        assert_eq!(row["a"], 2.0);
        assert_eq!(row["b"], 6.0);
    }

    #[test]
    fn test_digest_sensitivity() {
        let a = SampleMatrix::from_columns(names(&["x"]), vec![vec![1.0, 2.0]]).unwrap();
        let b = SampleMatrix::from_columns(names(&["x"]), vec![vec![1.0, 2.0]]).unwrap();
        let c = SampleMatrix::from_columns(names(&["x"]), vec![vec![2.0, 1.0]]).unwrap();
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
    }

    #[test]
    fn test_estimated_bytes() {
        assert_eq!(SampleMatrix::estimated_bytes(1_000, 4), 32_000);
        assert_eq!(SampleMatrix::estimated_bytes(usize::MAX, 2), usize::MAX);
    }
}
