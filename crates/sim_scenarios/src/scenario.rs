//! Immutable scenarios and their plain definitions.

use crate::error::ScenarioError;
use crate::outcome::{LossOrientation, Outcome, RiskThreshold};
use crate::variable::{Variable, VariableSpec};
use serde::{Deserialize, Serialize};
use sim_core::correlation::{Copula, CorrelationMatrix, CorrelationSpec};
use sim_core::types::ValidationError;
use std::collections::BTreeMap;

/// Plain description of a scenario, as supplied by templates, profiles and
/// custom requests.
///
/// Its canonical JSON form is what the content hash covers, so two
/// definitions that serialise identically are the same scenario.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    /// Scenario name
    pub name: String,
    /// Free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordered input variables
    pub variables: Vec<VariableSpec>,
    /// Correlation between variables
    #[serde(default)]
    pub correlation: CorrelationSpec,
    /// Copula; the engine default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copula: Option<Copula>,
    /// Derived outcome columns
    #[serde(default)]
    pub outcomes: Vec<Outcome>,
    /// Failure thresholds keyed by column name
    #[serde(default)]
    pub thresholds: BTreeMap<String, RiskThreshold>,
    /// Column used for loss metrics; defaults to the first outcome, else the
    /// first variable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_outcome: Option<String>,
    /// Loss direction of the primary outcome
    #[serde(default)]
    pub orientation: LossOrientation,
}

impl ScenarioDefinition {
    /// Empty definition with a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            variables: Vec::new(),
            correlation: CorrelationSpec::Independent,
            copula: None,
            outcomes: Vec::new(),
            thresholds: BTreeMap::new(),
            primary_outcome: None,
            orientation: LossOrientation::default(),
        }
    }

    /// Blake3 hex digest of the canonical JSON form.
    pub fn content_hash(&self) -> Result<String, ScenarioError> {
        let canonical = serde_json::to_vec(self)?;
        Ok(blake3::hash(&canonical).to_hex().to_string())
    }
}

/// Where a scenario came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ScenarioOrigin {
    /// Built-in template
    Template(String),
    /// Domain profile
    Profile(String),
    /// Caller-supplied definition
    Custom,
}

/// Bookkeeping attached to a scenario.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioMetadata {
    /// Origin
    pub origin: ScenarioOrigin,
    /// Largest declared time-step horizon among drifting variables
    pub time_steps: Option<usize>,
    /// Blake3 digest of the canonical definition
    pub content_hash: String,
}

/// Validated, immutable scenario.
///
/// Built by [`Scenario::from_definition`] (usually through the
/// [`ScenarioGenerator`](crate::ScenarioGenerator)) and shared behind an
/// `Arc`. Running a simulation never changes it.
///
/// # Examples
///
/// ```rust
/// use sim_core::distributions::Distribution;
/// use sim_scenarios::{Outcome, RiskThreshold, Scenario, ScenarioDefinition, ScenarioOrigin, VariableSpec};
///
/// let mut def = ScenarioDefinition::new("two_costs");
/// def.variables = vec![
///     VariableSpec::new("labour", Distribution::Normal { mean: 100.0, std_dev: 10.0 }),
///     VariableSpec::new("materials", Distribution::Uniform { low: 40.0, high: 60.0 }),
/// ];
/// def.outcomes = vec![Outcome::new("total").with_weight("labour", 1.0).with_weight("materials", 1.0)];
/// def.thresholds.insert("total".into(), RiskThreshold::above(170.0));
///
/// let scenario = Scenario::from_definition(def, ScenarioOrigin::Custom).unwrap();
/// assert_eq!(scenario.primary_outcome(), "total");
/// assert_eq!(scenario.column_names(), vec!["labour", "materials", "total"]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Scenario {
    definition: ScenarioDefinition,
    variables: Vec<Variable>,
    primary_outcome: String,
    metadata: ScenarioMetadata,
}

impl Scenario {
    /// Validates a definition and freezes it.
    ///
    /// # Errors
    ///
    /// `ScenarioError` for an empty scenario, duplicate or unknown names,
    /// invalid distributions or drift, a malformed correlation
    /// specification, or an invalid copula.
    pub fn from_definition(definition: ScenarioDefinition, origin: ScenarioOrigin) -> Result<Self, ScenarioError> {
        let scenario = definition.name.clone();
        if scenario.trim().is_empty() {
            return Err(ScenarioError::definition(scenario, "name must not be empty"));
        }
        if definition.variables.is_empty() {
            return Err(ScenarioError::definition(scenario, "at least one variable is required"));
        }

        let mut variables = Vec::with_capacity(definition.variables.len());
        for spec in &definition.variables {
            if variables.iter().any(|v: &Variable| v.name() == spec.name) {
                return Err(ValidationError::DuplicateVariable(spec.name.clone()).into());
            }
            variables.push(Variable::try_from(spec.clone())?);
        }
        let is_variable = |name: &str| variables.iter().any(|v| v.name() == name);

        for (i, outcome) in definition.outcomes.iter().enumerate() {
            if outcome.name.trim().is_empty() {
                return Err(ScenarioError::definition(&scenario, "outcome name must not be empty"));
            }
            if is_variable(&outcome.name) || definition.outcomes[..i].iter().any(|o| o.name == outcome.name) {
                return Err(ValidationError::DuplicateVariable(outcome.name.clone()).into());
            }
            if outcome.weights.is_empty() {
                return Err(ScenarioError::definition(
                    &scenario,
                    format!("outcome '{}' has no terms", outcome.name),
                ));
            }
            if !outcome.intercept.is_finite() {
                return Err(ValidationError::value(&outcome.name, "intercept must be finite").into());
            }
            for (name, weight) in &outcome.weights {
                if !is_variable(name) {
                    return Err(ValidationError::UnknownVariable(name.clone()).into());
                }
                if !weight.is_finite() {
                    return Err(ValidationError::value(
                        format!("{}.{}", outcome.name, name),
                        "weight must be finite",
                    )
                    .into());
                }
            }
        }

        let has_column =
            |name: &str| is_variable(name) || definition.outcomes.iter().any(|o| o.name == name);

        for (column, threshold) in &definition.thresholds {
            if !has_column(column) {
                return Err(ValidationError::UnknownVariable(column.clone()).into());
            }
            if !threshold.value.is_finite() {
                return Err(ValidationError::value(column, "threshold must be finite").into());
            }
        }

        let primary_outcome = match &definition.primary_outcome {
            Some(name) if has_column(name) => name.clone(),
            Some(name) => return Err(ValidationError::UnknownVariable(name.clone()).into()),
            None => definition
                .outcomes
                .first()
                .map(|o| o.name.clone())
                .unwrap_or_else(|| variables[0].name().to_string()),
        };

        if let Some(copula) = &definition.copula {
            copula.validate()?;
        }
        let names: Vec<String> = variables.iter().map(|v| v.name().to_string()).collect();
        definition.correlation.resolve(&names)?;

        let time_steps = variables
            .iter()
            .filter_map(|v| v.drift().and_then(|d| d.time_steps()))
            .max();
        let content_hash = definition.content_hash()?;

        tracing::debug!(
            scenario = %definition.name,
            variables = variables.len(),
            outcomes = definition.outcomes.len(),
            hash = %content_hash,
            "scenario created"
        );

        Ok(Self {
            definition,
            variables,
            primary_outcome,
            metadata: ScenarioMetadata {
                origin,
                time_steps,
                content_hash,
            },
        })
    }

    /// Scenario name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Description.
    pub fn description(&self) -> Option<&str> {
        self.definition.description.as_deref()
    }

    /// Input variables in order.
    #[inline]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Looks up a variable.
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name() == name)
    }

    /// Input variable names in order.
    pub fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.name().to_string()).collect()
    }

    /// Correlation specification.
    #[inline]
    pub fn correlation(&self) -> &CorrelationSpec {
        &self.definition.correlation
    }

    /// Resolves the correlation specification over the variables.
    pub fn resolve_correlation(&self) -> Result<CorrelationMatrix, ValidationError> {
        self.definition.correlation.resolve(&self.variable_names())
    }

    /// Copula requested by the scenario, if any.
    #[inline]
    pub fn copula(&self) -> Option<Copula> {
        self.definition.copula
    }

    /// Derived outcomes.
    #[inline]
    pub fn outcomes(&self) -> &[Outcome] {
        &self.definition.outcomes
    }

    /// Failure thresholds.
    #[inline]
    pub fn thresholds(&self) -> &BTreeMap<String, RiskThreshold> {
        &self.definition.thresholds
    }

    /// Column used for loss metrics.
    #[inline]
    pub fn primary_outcome(&self) -> &str {
        &self.primary_outcome
    }

    /// Loss direction of the primary outcome.
    #[inline]
    pub fn orientation(&self) -> LossOrientation {
        self.definition.orientation
    }

    /// Metadata.
    #[inline]
    pub fn metadata(&self) -> &ScenarioMetadata {
        &self.metadata
    }

    /// Content hash.
    #[inline]
    pub fn content_hash(&self) -> &str {
        &self.metadata.content_hash
    }

    /// Definition this scenario was built from.
    #[inline]
    pub fn definition(&self) -> &ScenarioDefinition {
        &self.definition
    }

    /// Variables followed by outcomes.
    pub fn column_names(&self) -> Vec<String> {
        self.variables
            .iter()
            .map(|v| v.name().to_string())
            .chain(self.definition.outcomes.iter().map(|o| o.name.clone()))
            .collect()
    }

    /// Whether `name` is a variable or outcome.
    pub fn has_column(&self, name: &str) -> bool {
        self.variable(name).is_some() || self.definition.outcomes.iter().any(|o| o.name == name)
    }

    /// Whether any variable drifts.
    pub fn is_dynamic(&self) -> bool {
        self.variables.iter().any(|v| v.drift().is_some())
    }

    /// Checks every drifting variable over a run of `iterations`.
    pub fn check_drift_range(&self, iterations: usize) -> Result<(), ValidationError> {
        self.variables
            .iter()
            .try_for_each(|v| v.check_drift_range(iterations))
    }

    /// Copy with thresholds merged in; the content hash is recomputed.
    pub fn with_thresholds(&self, thresholds: BTreeMap<String, RiskThreshold>) -> Result<Self, ScenarioError> {
        if thresholds.is_empty() {
            return Ok(self.clone());
        }
        let mut definition = self.definition.clone();
        definition.thresholds.extend(thresholds);
        Self::from_definition(definition, self.metadata.origin.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::correlation::CorrelationPair;
    use sim_core::distributions::{Distribution, ParamKey};
    use crate::variable::{DriftClock, ParameterDrift};

    fn base() -> ScenarioDefinition {
        let mut def = ScenarioDefinition::new("base");
        def.variables = vec![
            VariableSpec::new("a", Distribution::Normal { mean: 0.0, std_dev: 1.0 }),
            VariableSpec::new("b", Distribution::Exponential { rate: 1.0 }),
        ];
        def
    }

    #[test]
    fn test_primary_defaults_to_first_variable() {
        let s = Scenario::from_definition(base(), ScenarioOrigin::Custom).unwrap();
        assert_eq!(s.primary_outcome(), "a");
        assert!(!s.is_dynamic());
        assert_eq!(s.metadata().time_steps, None);
    }

    #[test]
    fn test_rejects_duplicate_variable() {
        let mut def = base();
        def.variables.push(VariableSpec::new("a", Distribution::Exponential { rate: 2.0 }));
        assert_eq!(
            Scenario::from_definition(def, ScenarioOrigin::Custom),
            Err(ScenarioError::Validation(ValidationError::DuplicateVariable("a".into())))
        );
    }

    #[test]
    fn test_rejects_outcome_shadowing_variable() {
        let mut def = base();
        def.outcomes.push(Outcome::new("a").with_weight("b", 1.0));
        assert!(Scenario::from_definition(def, ScenarioOrigin::Custom).is_err());
    }

    #[test]
    fn test_rejects_unknown_outcome_term() {
        let mut def = base();
        def.outcomes.push(Outcome::new("sum").with_weight("zzz", 1.0));
        assert_eq!(
            Scenario::from_definition(def, ScenarioOrigin::Custom),
            Err(ScenarioError::Validation(ValidationError::UnknownVariable("zzz".into())))
        );
    }

    #[test]
    fn test_rejects_unknown_threshold_column() {
        let mut def = base();
        def.thresholds.insert("missing".into(), RiskThreshold::above(1.0));
        assert!(Scenario::from_definition(def, ScenarioOrigin::Custom).is_err());
    }

    #[test]
    fn test_rejects_unknown_correlation_name() {
        let mut def = base();
        def.correlation = CorrelationSpec::Pairwise {
            pairs: vec![CorrelationPair::new("a", "c", 0.2)],
        };
        assert!(Scenario::from_definition(def, ScenarioOrigin::Custom).is_err());
    }

    #[test]
    fn test_rejects_empty() {
        let def = ScenarioDefinition::new("empty");
        assert!(matches!(
            Scenario::from_definition(def, ScenarioOrigin::Custom),
            Err(ScenarioError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn test_hash_tracks_content() {
        let a = Scenario::from_definition(base(), ScenarioOrigin::Custom).unwrap();
        let b = Scenario::from_definition(base(), ScenarioOrigin::Template("x".into())).unwrap();
        assert_eq!(a.content_hash(), b.content_hash());

        let mut def = base();
        def.variables[1] = VariableSpec::new("b", Distribution::Exponential { rate: 1.5 });
        let c = Scenario::from_definition(def, ScenarioOrigin::Custom).unwrap();
        assert_ne!(a.content_hash(), c.content_hash());
    }

    #[test]
    fn test_with_thresholds_rehashes() {
        let s = Scenario::from_definition(base(), ScenarioOrigin::Custom).unwrap();
        let mut overrides = BTreeMap::new();
        overrides.insert("a".to_string(), RiskThreshold::below(-2.0));
        let t = s.with_thresholds(overrides).unwrap();
        assert_eq!(t.thresholds().len(), 1);
        assert_ne!(s.content_hash(), t.content_hash());
        assert!(s.thresholds().is_empty());
    }

    #[test]
    fn test_time_step_horizon_recorded() {
        let mut def = base();
        def.variables[0].drift = Some(ParameterDrift {
            param: ParamKey::Mean,
            per_step: 0.1,
            clock: DriftClock::TimeSteps { steps: 12 },
        });
        let s = Scenario::from_definition(def, ScenarioOrigin::Custom).unwrap();
        assert!(s.is_dynamic());
        assert_eq!(s.metadata().time_steps, Some(12));
    }
}
