//! Scenario generator: templates, profiles and custom definitions with
//! caller overrides.

use crate::error::ScenarioError;
use crate::outcome::{LossOrientation, Outcome, RiskThreshold};
use crate::profiles::ProfileCatalog;
use crate::scenario::{Scenario, ScenarioDefinition, ScenarioOrigin};
use crate::templates::Template;
use crate::variable::{ParameterDrift, VariableSpec};
use serde::{Deserialize, Serialize};
use sim_core::correlation::{Copula, CorrelationSpec};
use sim_core::types::ValidationError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Caller changes applied on top of a template or profile.
///
/// Variables and outcomes are replaced by name or appended; thresholds are
/// merged; drift is attached to named variables after replacement.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioOverrides {
    /// Rename the resulting scenario
    pub name: Option<String>,
    /// Variables to replace (same name) or add
    pub variables: Vec<VariableSpec>,
    /// Replacement correlation specification
    pub correlation: Option<CorrelationSpec>,
    /// Copula to use
    pub copula: Option<Copula>,
    /// Outcomes to replace (same name) or add
    pub outcomes: Vec<Outcome>,
    /// Thresholds to merge in
    pub thresholds: BTreeMap<String, RiskThreshold>,
    /// Drift to attach, keyed by variable name
    pub drift: BTreeMap<String, ParameterDrift>,
    /// Replacement primary outcome
    pub primary_outcome: Option<String>,
    /// Replacement loss orientation
    pub orientation: Option<LossOrientation>,
}

impl ScenarioOverrides {
    /// Whether nothing is overridden.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies the overrides to a definition.
    ///
    /// # Errors
    ///
    /// `ValidationError::UnknownVariable` when drift names a variable the
    /// definition does not have.
    pub fn apply(&self, mut def: ScenarioDefinition) -> Result<ScenarioDefinition, ScenarioError> {
        if let Some(name) = &self.name {
            def.name = name.clone();
        }
        for replacement in &self.variables {
            match def.variables.iter_mut().find(|v| v.name == replacement.name) {
                Some(existing) => *existing = replacement.clone(),
                None => def.variables.push(replacement.clone()),
            }
        }
        if let Some(correlation) = &self.correlation {
            def.correlation = correlation.clone();
        }
        if self.copula.is_some() {
            def.copula = self.copula;
        }
        for replacement in &self.outcomes {
            match def.outcomes.iter_mut().find(|o| o.name == replacement.name) {
                Some(existing) => *existing = replacement.clone(),
                None => def.outcomes.push(replacement.clone()),
            }
        }
        def.thresholds
            .extend(self.thresholds.iter().map(|(k, v)| (k.clone(), *v)));
        for (name, drift) in &self.drift {
            let variable = def
                .variables
                .iter_mut()
                .find(|v| &v.name == name)
                .ok_or_else(|| ValidationError::UnknownVariable(name.clone()))?;
            variable.drift = Some(*drift);
        }
        if let Some(primary) = &self.primary_outcome {
            def.primary_outcome = Some(primary.clone());
        }
        if let Some(orientation) = self.orientation {
            def.orientation = orientation;
        }
        Ok(def)
    }
}

/// Where a scenario comes from in a request.
///
/// Serialised untagged, so requests read
/// `{"template": "supply_chain", "overrides": {..}}`,
/// `{"profile": "financial_portfolio"}` or `{"custom": {..}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScenarioSource {
    /// Built-in template with optional overrides.
    Template {
        /// Template name
        template: String,
        /// Overrides
        #[serde(default, skip_serializing_if = "ScenarioOverrides::is_empty")]
        overrides: ScenarioOverrides,
    },
    /// Domain profile with optional overrides.
    Profile {
        /// Profile name
        profile: String,
        /// Overrides
        #[serde(default, skip_serializing_if = "ScenarioOverrides::is_empty")]
        overrides: ScenarioOverrides,
    },
    /// Entirely custom definition.
    Custom {
        /// The definition
        custom: ScenarioDefinition,
    },
}

/// Builds immutable scenarios.
///
/// # Examples
///
/// ```rust
/// use sim_scenarios::{RiskThreshold, ScenarioGenerator, ScenarioOverrides, Template};
///
/// let generator = ScenarioGenerator::with_builtin_profiles();
///
/// let mut overrides = ScenarioOverrides::default();
/// overrides.thresholds.insert("total_duration".into(), RiskThreshold::above(90.0));
/// let scenario = generator.from_template(Template::ProjectPlanning, &overrides).unwrap();
/// assert_eq!(scenario.thresholds()["total_duration"].value, 90.0);
///
/// let defense = generator.from_profile("defense_capability", &ScenarioOverrides::default()).unwrap();
/// assert_eq!(defense.variables().len(), 10);
/// ```
#[derive(Clone, Debug)]
pub struct ScenarioGenerator {
    catalog: Arc<ProfileCatalog>,
}

impl ScenarioGenerator {
    /// Generator over a profile catalogue.
    pub fn new(catalog: Arc<ProfileCatalog>) -> Self {
        Self { catalog }
    }

    /// Generator over the built-in profiles only.
    pub fn with_builtin_profiles() -> Self {
        Self::new(Arc::new(ProfileCatalog::builtin()))
    }

    /// Profile catalogue in use.
    pub fn catalog(&self) -> &ProfileCatalog {
        &self.catalog
    }

    /// Scenario from a built-in template.
    pub fn from_template(
        &self,
        template: Template,
        overrides: &ScenarioOverrides,
    ) -> Result<Arc<Scenario>, ScenarioError> {
        let def = overrides.apply(template.definition())?;
        Self::freeze(def, ScenarioOrigin::Template(template.name().to_string()))
    }

    /// Scenario from a catalogued profile.
    pub fn from_profile(
        &self,
        profile: &str,
        overrides: &ScenarioOverrides,
    ) -> Result<Arc<Scenario>, ScenarioError> {
        let profile = self
            .catalog
            .get(profile)
            .ok_or_else(|| ScenarioError::UnknownProfile(profile.to_string()))?;
        let def = overrides.apply(profile.to_definition())?;
        Self::freeze(def, ScenarioOrigin::Profile(profile.name.clone()))
    }

    /// Scenario from a caller definition.
    pub fn custom(&self, definition: ScenarioDefinition) -> Result<Arc<Scenario>, ScenarioError> {
        Self::freeze(definition, ScenarioOrigin::Custom)
    }

    /// Scenario from any source.
    pub fn generate(&self, source: &ScenarioSource) -> Result<Arc<Scenario>, ScenarioError> {
        match source {
            ScenarioSource::Template { template, overrides } => {
                self.from_template(template.parse()?, overrides)
            }
            ScenarioSource::Profile { profile, overrides } => self.from_profile(profile, overrides),
            ScenarioSource::Custom { custom } => self.custom(custom.clone()),
        }
    }

    fn freeze(def: ScenarioDefinition, origin: ScenarioOrigin) -> Result<Arc<Scenario>, ScenarioError> {
        let scenario = Scenario::from_definition(def, origin)?;
        tracing::info!(
            scenario = %scenario.name(),
            origin = ?scenario.metadata().origin,
            variables = scenario.variables().len(),
            dynamic = scenario.is_dynamic(),
            "generated scenario"
        );
        Ok(Arc::new(scenario))
    }
}

impl Default for ScenarioGenerator {
    fn default() -> Self {
        Self::with_builtin_profiles()
    }
}
