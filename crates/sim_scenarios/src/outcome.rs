//! Derived outcomes, risk thresholds and loss orientation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Linear combination of input variables, e.g. a readiness score.
///
/// `value = intercept + Σ weight × variable`
///
/// # Examples
///
/// ```rust
/// use sim_scenarios::Outcome;
///
/// let outcome = Outcome::new("total")
///     .with_weight("a", 2.0)
///     .with_weight("b", -1.0)
///     .with_intercept(5.0);
/// let value = outcome.evaluate(|name| if name == "a" { 3.0 } else { 4.0 });
/// assert_eq!(value, 7.0);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Column name
    pub name: String,
    /// Constant term
    #[serde(default)]
    pub intercept: f64,
    /// Weight per input variable
    pub weights: BTreeMap<String, f64>,
    /// Free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Outcome {
    /// Outcome with no terms.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            intercept: 0.0,
            weights: BTreeMap::new(),
            description: None,
        }
    }

    /// Adds or replaces a weight.
    pub fn with_weight(mut self, variable: impl Into<String>, weight: f64) -> Self {
        self.weights.insert(variable.into(), weight);
        self
    }

    /// Sets the constant term.
    pub fn with_intercept(mut self, intercept: f64) -> Self {
        self.intercept = intercept;
        self
    }

    /// Sets the description.
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Evaluates with variable values supplied by `lookup`.
    pub fn evaluate(&self, lookup: impl Fn(&str) -> f64) -> f64 {
        self.weights
            .iter()
            .fold(self.intercept, |acc, (name, w)| acc + w * lookup(name))
    }
}

/// Side of a threshold that counts as a breach.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Breach {
    /// Values strictly below the threshold breach.
    Below,
    /// Values strictly above the threshold breach.
    Above,
}

/// A failure threshold on one column.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskThreshold {
    /// Threshold value
    pub value: f64,
    /// Breach side
    pub breach: Breach,
}

impl RiskThreshold {
    /// Breach when the value falls below `value`.
    pub fn below(value: f64) -> Self {
        Self {
            value,
            breach: Breach::Below,
        }
    }

    /// Breach when the value exceeds `value`.
    pub fn above(value: f64) -> Self {
        Self {
            value,
            breach: Breach::Above,
        }
    }

    /// Whether `x` breaches the threshold.
    #[inline]
    pub fn is_breached(&self, x: f64) -> bool {
        match self.breach {
            Breach::Below => x < self.value,
            Breach::Above => x > self.value,
        }
    }
}

/// Which direction of the primary outcome is a loss.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossOrientation {
    /// Larger values are worse (cost, incident loss): loss = value.
    #[default]
    HigherIsWorse,
    /// Smaller values are worse (return, readiness): loss = −value.
    LowerIsWorse,
}

impl LossOrientation {
    /// Converts an outcome value to a loss.
    #[inline]
    pub fn to_loss(&self, value: f64) -> f64 {
        match self {
            Self::HigherIsWorse => value,
            Self::LowerIsWorse => -value,
        }
    }

    /// Converts a loss back to an outcome value.
    #[inline]
    pub fn from_loss(&self, loss: f64) -> f64 {
        self.to_loss(loss)
    }

    /// Breach side matching this orientation.
    pub fn breach(&self) -> Breach {
        match self {
            Self::HigherIsWorse => Breach::Above,
            Self::LowerIsWorse => Breach::Below,
        }
    }
}
