//! Correlation specifications and their resolution to a full matrix.

use super::matrix::CorrelationMatrix;
use crate::types::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fewest observations accepted per series when estimating.
pub const MIN_OBSERVATIONS: usize = 3;

/// One entry of a sparse pairwise specification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPair {
    /// First variable
    pub a: String,
    /// Second variable
    pub b: String,
    /// Correlation coefficient in [-1, 1]
    pub rho: f64,
}

impl CorrelationPair {
    /// Creates a pair entry.
    pub fn new(a: impl Into<String>, b: impl Into<String>, rho: f64) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            rho,
        }
    }
}

/// Estimator used in [`CorrelationSpec::Estimated`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationMethod {
    /// Product-moment correlation.
    #[default]
    Pearson,
    /// Rank correlation with average ranks for ties.
    Spearman,
}

/// How the variables of a scenario are correlated.
///
/// Variables not mentioned by the specification are independent of every
/// other variable.
///
/// # Examples
///
/// ```rust
/// use sim_core::correlation::{CorrelationPair, CorrelationSpec};
///
/// let spec = CorrelationSpec::Pairwise {
///     pairs: vec![CorrelationPair::new("rates", "inflation", 0.6)],
/// };
/// let names = vec!["equity".to_string(), "rates".to_string(), "inflation".to_string()];
/// let m = spec.resolve(&names).unwrap();
/// assert_eq!(m.get(1, 2), 0.6);
/// assert_eq!(m.get(0, 1), 0.0);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CorrelationSpec {
    /// Every variable independent.
    #[default]
    Independent,
    /// Dense matrix over a subset of the variables.
    Explicit {
        /// Names in matrix order
        variables: Vec<String>,
        /// Square, symmetric rows
        matrix: Vec<Vec<f64>>,
    },
    /// Sparse list of pairs; unspecified pairs are 0.
    Pairwise {
        /// Pair entries
        pairs: Vec<CorrelationPair>,
    },
    /// Estimated from historical observations.
    Estimated {
        /// Equal-length series keyed by variable name
        observations: BTreeMap<String, Vec<f64>>,
        /// Estimator
        #[serde(default)]
        method: EstimationMethod,
    },
}

impl CorrelationSpec {
    /// Whether this specification is the independent one.
    pub fn is_independent(&self) -> bool {
        matches!(self, Self::Independent)
    }

    /// Names referenced by the specification.
    pub fn referenced_names(&self) -> Vec<&str> {
        match self {
            Self::Independent => Vec::new(),
            Self::Explicit { variables, .. } => variables.iter().map(String::as_str).collect(),
            Self::Pairwise { pairs } => pairs
                .iter()
                .flat_map(|p| [p.a.as_str(), p.b.as_str()])
                .collect(),
            Self::Estimated { observations, .. } => observations.keys().map(String::as_str).collect(),
        }
    }

    /// Resolves to a full matrix over `names`, in that order.
    ///
    /// The result is structurally valid but may still fail the PSD check;
    /// see [`ensure_psd`](super::ensure_psd).
    ///
    /// # Errors
    ///
    /// `ValidationError` if the specification names an unknown variable,
    /// is structurally invalid, or (estimation mode) has too few or
    /// mismatched observations.
    pub fn resolve(&self, names: &[String]) -> Result<CorrelationMatrix, ValidationError> {
        let position = |name: &str| {
            names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| ValidationError::UnknownVariable(name.to_string()))
        };
        let mut full = CorrelationMatrix::identity(names.to_vec());

        match self {
            Self::Independent => {}
            Self::Explicit { variables, matrix } => {
                let sub = CorrelationMatrix::from_rows(variables.clone(), matrix.clone())?;
                let idx = variables
                    .iter()
                    .map(|v| position(v))
                    .collect::<Result<Vec<_>, _>>()?;
                for (i, &gi) in idx.iter().enumerate() {
                    for (j, &gj) in idx.iter().enumerate().skip(i + 1) {
                        full.set_symmetric(gi, gj, sub.get(i, j));
                    }
                }
            }
            Self::Pairwise { pairs } => {
                let mut seen: BTreeMap<(usize, usize), f64> = BTreeMap::new();
                for pair in pairs {
                    let (i, j) = (position(&pair.a)?, position(&pair.b)?);
                    if i == j {
                        return Err(ValidationError::correlation(format!(
                            "pair correlates '{}' with itself",
                            pair.a
                        )));
                    }
                    if !pair.rho.is_finite() || pair.rho.abs() > 1.0 {
                        return Err(ValidationError::correlation(format!(
                            "rho {} between '{}' and '{}' outside [-1, 1]",
                            pair.rho, pair.a, pair.b
                        )));
                    }
                    let key = (i.min(j), i.max(j));
                    if let Some(&previous) = seen.get(&key) {
                        if previous != pair.rho {
                            return Err(ValidationError::correlation(format!(
                                "conflicting entries for '{}' and '{}' ({} vs {})",
                                pair.a, pair.b, previous, pair.rho
                            )));
                        }
                    }
                    seen.insert(key, pair.rho);
                    full.set_symmetric(i, j, pair.rho);
                }
            }
            Self::Estimated { observations, method } => {
                let series: Vec<(usize, &str, &[f64])> = observations
                    .iter()
                    .map(|(name, values)| Ok((position(name)?, name.as_str(), values.as_slice())))
                    .collect::<Result<_, ValidationError>>()?;
                let estimated = estimate(&series, *method)?;
                for (a, &(gi, _, _)) in series.iter().enumerate() {
                    for (b, &(gj, _, _)) in series.iter().enumerate().skip(a + 1) {
                        full.set_symmetric(gi, gj, estimated[a][b]);
                    }
                }
            }
        }

        full.validate()?;
        Ok(full)
    }
}

fn estimate(
    series: &[(usize, &str, &[f64])],
    method: EstimationMethod,
) -> Result<Vec<Vec<f64>>, ValidationError> {
    let len = series.first().map_or(0, |s| s.2.len());
    for &(_, name, values) in series {
        if values.len() < MIN_OBSERVATIONS {
            return Err(ValidationError::InsufficientObservations {
                got: values.len(),
                need: MIN_OBSERVATIONS,
            });
        }
        if values.len() != len {
            return Err(ValidationError::correlation(format!(
                "series '{}' has {} observations, expected {}",
                name,
                values.len(),
                len
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ValidationError::value(name, "observations must be finite"));
        }
    }

    let transformed: Vec<Vec<f64>> = series
        .iter()
        .map(|&(_, _, values)| match method {
            EstimationMethod::Pearson => values.to_vec(),
            EstimationMethod::Spearman => average_ranks(values),
        })
        .collect();

    let k = series.len();
    let mut out = vec![vec![0.0; k]; k];
    for a in 0..k {
        out[a][a] = 1.0;
        for b in (a + 1)..k {
            let r = pearson(&transformed[a], &transformed[b]).ok_or_else(|| {
                ValidationError::correlation(format!(
                    "correlation between '{}' and '{}' is undefined for a constant series",
                    series[a].1, series[b].1
                ))
            })?;
            out[a][b] = r;
            out[b][a] = r;
        }
    }
    Ok(out)
}

/// Pearson correlation of two equal-length series.
///
/// Returns `None` when either series has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (&xi, &yi) in x[..n].iter().zip(&y[..n]) {
        let (dx, dy) = (xi - mean_x, yi - mean_y);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// 1-based ranks, ties receiving the average of the ranks they span.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end share rank (start+1 + end) / 2
        let rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_independent_resolves_to_identity() {
        let m = CorrelationSpec::Independent.resolve(&names(&["a", "b"])).unwrap();
        assert!(m.is_identity());
    }

    #[test]
    fn test_explicit_embeds_submatrix() {
        let spec = CorrelationSpec::Explicit {
            variables: names(&["c", "a"]),
            matrix: vec![vec![1.0, -0.4], vec![-0.4, 1.0]],
        };
        let m = spec.resolve(&names(&["a", "b", "c"])).unwrap();
        assert_eq!(m.get(0, 2), -0.4);
        assert_eq!(m.get(2, 0), -0.4);
        assert_eq!(m.get(0, 1), 0.0);
        assert_eq!(m.get(1, 2), 0.0);
    }

    #[test]
    fn test_explicit_unknown_name() {
        let spec = CorrelationSpec::Explicit {
            variables: names(&["a", "zzz"]),
            matrix: vec![vec![1.0, 0.1], vec![0.1, 1.0]],
        };
        assert_eq!(
            spec.resolve(&names(&["a", "b"])),
            Err(ValidationError::UnknownVariable("zzz".to_string()))
        );
    }

    #[test]
    fn test_pairwise_rejects_self_and_range() {
        let spec = CorrelationSpec::Pairwise {
            pairs: vec![CorrelationPair::new("a", "a", 0.5)],
        };
        assert!(spec.resolve(&names(&["a"])).is_err());

        let spec = CorrelationSpec::Pairwise {
            pairs: vec![CorrelationPair::new("a", "b", -1.5)],
        };
        assert!(spec.resolve(&names(&["a", "b"])).is_err());
    }

    #[test]
    fn test_pairwise_conflicting_duplicates() {
        let spec = CorrelationSpec::Pairwise {
            pairs: vec![
                CorrelationPair::new("a", "b", 0.5),
                CorrelationPair::new("b", "a", 0.2),
            ],
        };
        let err = spec.resolve(&names(&["a", "b"])).unwrap_err();
        assert!(err.to_string().contains("conflicting"));
    }

    #[test]
    fn test_pearson_estimation() {
        let mut observations = BTreeMap::new();
        observations.insert("x".to_string(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        observations.insert("y".to_string(), vec![2.0, 4.0, 6.0, 8.0, 10.0]);
        observations.insert("z".to_string(), vec![5.0, 4.0, 3.0, 2.0, 1.0]);
        let spec = CorrelationSpec::Estimated {
            observations,
            method: EstimationMethod::Pearson,
        };
        let m = spec.resolve(&names(&["x", "y", "z"])).unwrap();
        assert_relative_eq!(m.get(0, 1), 1.0, epsilon = 1e-12);
        assert_relative_eq!(m.get(0, 2), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_spearman_is_rank_based() {
        let mut observations = BTreeMap::new();
        observations.insert("x".to_string(), vec![1.0, 2.0, 3.0, 4.0]);
        observations.insert("y".to_string(), vec![1.0, 8.0, 27.0, 1000.0]);
        let spec = CorrelationSpec::Estimated {
            observations,
            method: EstimationMethod::Spearman,
        };
        let m = spec.resolve(&names(&["x", "y"])).unwrap();
        assert_relative_eq!(m.get(0, 1), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_estimation_needs_three_observations() {
        let mut observations = BTreeMap::new();
        observations.insert("x".to_string(), vec![1.0, 2.0]);
        observations.insert("y".to_string(), vec![2.0, 1.0]);
        let spec = CorrelationSpec::Estimated {
            observations,
            method: EstimationMethod::Pearson,
        };
        assert_eq!(
            spec.resolve(&names(&["x", "y"])),
            Err(ValidationError::InsufficientObservations { got: 2, need: 3 })
        );
    }

    #[test]
    fn test_estimation_rejects_mismatched_lengths() {
        let mut observations = BTreeMap::new();
        observations.insert("x".to_string(), vec![1.0, 2.0, 3.0]);
        observations.insert("y".to_string(), vec![2.0, 1.0, 0.0, 4.0]);
        let spec = CorrelationSpec::Estimated {
            observations,
            method: EstimationMethod::Pearson,
        };
        assert!(spec.resolve(&names(&["x", "y"])).is_err());
    }

    #[test]
    fn test_average_ranks_with_ties() {
        assert_eq!(average_ranks(&[10.0, 20.0, 20.0, 5.0]), vec![2.0, 3.5, 3.5, 1.0]);
    }

    #[test]
    fn test_pearson_constant_series() {
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
    }

    #[test]
    fn test_serde_mode_tag() {
        let spec: CorrelationSpec = serde_json::from_str(
            r#"{"mode":"pairwise","pairs":[{"a":"x","b":"y","rho":0.25}]}"#,
        )
        .unwrap();
        assert_eq!(
            spec,
            CorrelationSpec::Pairwise {
                pairs: vec![CorrelationPair::new("x", "y", 0.25)]
            }
        );
        let spec: CorrelationSpec =
            serde_json::from_str(r#"{"mode":"estimated","observations":{"x":[1,2,3]}}"#).unwrap();
        assert!(matches!(spec, CorrelationSpec::Estimated { method: EstimationMethod::Pearson, .. }));
    }
}
