//! Scenario variables and deterministic parameter drift.

use serde::{Deserialize, Serialize};
use sim_core::distributions::{Distribution, ParamKey};
use sim_core::types::ValidationError;

/// Clock that advances a drifting parameter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriftClock {
    /// One step per global iteration index.
    #[default]
    Iteration,
    /// A declared number of time steps spread evenly over the iterations.
    TimeSteps {
        /// Number of steps (> 0)
        steps: usize,
    },
}

/// Linear drift of one distribution parameter.
///
/// At step `k` the parameter equals its base value plus `k × per_step`.
///
/// # Examples
///
/// ```rust
/// use sim_core::distributions::ParamKey;
/// use sim_scenarios::{DriftClock, ParameterDrift};
///
/// let drift = ParameterDrift {
///     param: ParamKey::Mean,
///     per_step: 0.5,
///     clock: DriftClock::TimeSteps { steps: 4 },
/// };
/// // 100 iterations over 4 steps: iterations 50..75 are step 2
/// assert_eq!(drift.step_at(60, 100), 2);
/// assert_eq!(drift.offset_at(60, 100), 1.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterDrift {
    /// Parameter that drifts
    pub param: ParamKey,
    /// Change per step
    pub per_step: f64,
    /// What counts as a step
    #[serde(default)]
    pub clock: DriftClock,
}

impl ParameterDrift {
    /// Step reached at a global iteration index of a run with `total`
    /// iterations.
    pub fn step_at(&self, iteration: usize, total: usize) -> usize {
        match self.clock {
            DriftClock::Iteration => iteration,
            DriftClock::TimeSteps { steps } => {
                if total == 0 {
                    return 0;
                }
                let step = (iteration as u128 * steps as u128 / total as u128) as usize;
                step.min(steps.saturating_sub(1))
            }
        }
    }

    /// Last step of a run with `total` iterations.
    pub fn last_step(&self, total: usize) -> usize {
        self.step_at(total.saturating_sub(1), total)
    }

    /// Parameter offset at a global iteration index.
    #[inline]
    pub fn offset_at(&self, iteration: usize, total: usize) -> f64 {
        self.per_step * self.step_at(iteration, total) as f64
    }

    /// Number of declared time steps, if the clock is time-step based.
    pub fn time_steps(&self) -> Option<usize> {
        match self.clock {
            DriftClock::Iteration => None,
            DriftClock::TimeSteps { steps } => Some(steps),
        }
    }

    fn validate(&self, variable: &str) -> Result<(), ValidationError> {
        if !self.per_step.is_finite() {
            return Err(ValidationError::value(
                format!("{}.drift.per_step", variable),
                "must be finite",
            ));
        }
        if let DriftClock::TimeSteps { steps: 0 } = self.clock {
            return Err(ValidationError::value(
                format!("{}.drift.clock", variable),
                "time steps must be positive",
            ));
        }
        Ok(())
    }
}

/// Plain, unvalidated form of a [`Variable`], as found in requests and
/// profile files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Unique name within a scenario
    pub name: String,
    /// Marginal distribution
    pub distribution: Distribution,
    /// Domain tag (e.g. "financial")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional parameter drift
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drift: Option<ParameterDrift>,
}

impl VariableSpec {
    /// Spec with just a name and distribution.
    pub fn new(name: impl Into<String>, distribution: Distribution) -> Self {
        Self {
            name: name.into(),
            distribution,
            domain: None,
            description: None,
            drift: None,
        }
    }

    /// Sets the description.
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A named random input with a validated distribution.
///
/// Immutable once constructed: fields are private and only readable
/// through getters.
///
/// # Examples
///
/// ```rust
/// use sim_core::distributions::Distribution;
/// use sim_scenarios::Variable;
///
/// let v = Variable::new("lead_time", Distribution::Gamma { shape: 4.0, scale: 3.0 }).unwrap();
/// assert_eq!(v.name(), "lead_time");
///
/// assert!(Variable::new("bad", Distribution::Exponential { rate: -1.0 }).is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "VariableSpec", into = "VariableSpec")]
pub struct Variable {
    name: String,
    distribution: Distribution,
    domain: Option<String>,
    description: Option<String>,
    drift: Option<ParameterDrift>,
}

impl Variable {
    /// Creates a variable, validating the distribution.
    pub fn new(name: impl Into<String>, distribution: Distribution) -> Result<Self, ValidationError> {
        Self::try_from(VariableSpec::new(name, distribution))
    }

    /// Variable name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base distribution (before drift).
    #[inline]
    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }

    /// Domain tag.
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Parameter drift, if dynamic.
    #[inline]
    pub fn drift(&self) -> Option<&ParameterDrift> {
        self.drift.as_ref()
    }

    /// Distribution in force at a global iteration index.
    ///
    /// # Errors
    ///
    /// `ValidationError` if the drifted parameters leave the family's support.
    pub fn distribution_at(&self, iteration: usize, total: usize) -> Result<Distribution, ValidationError> {
        match &self.drift {
            None => Ok(self.distribution),
            Some(drift) => self
                .distribution
                .with_param_offset(drift.param, drift.offset_at(iteration, total)),
        }
    }

    /// Checks the drifted distribution at both ends of a run of `total`
    /// iterations. Linear drift puts the extremes at the ends.
    pub fn check_drift_range(&self, total: usize) -> Result<(), ValidationError> {
        if let Some(drift) = &self.drift {
            self.distribution.with_param_offset(drift.param, 0.0)?;
            let last = drift.last_step(total) as f64;
            self.distribution
                .with_param_offset(drift.param, drift.per_step * last)?;
        }
        Ok(())
    }
}

impl TryFrom<VariableSpec> for Variable {
    type Error = ValidationError;

    fn try_from(spec: VariableSpec) -> Result<Self, Self::Error> {
        if spec.name.trim().is_empty() {
            return Err(ValidationError::value("name", "variable name must not be empty"));
        }
        spec.distribution.validate()?;
        if let Some(drift) = &spec.drift {
            drift.validate(&spec.name)?;
            // the drifted parameter must exist for this family
            spec.distribution.with_param_offset(drift.param, 0.0)?;
            if let Some(steps) = drift.time_steps() {
                spec.distribution
                    .with_param_offset(drift.param, drift.per_step * (steps - 1) as f64)?;
            }
        }
        Ok(Self {
            name: spec.name,
            distribution: spec.distribution,
            domain: spec.domain,
            description: spec.description,
            drift: spec.drift,
        })
    }
}

impl From<Variable> for VariableSpec {
    fn from(v: Variable) -> Self {
        Self {
            name: v.name,
            distribution: v.distribution,
            domain: v.domain,
            description: v.description,
            drift: v.drift,
        }
    }
}
