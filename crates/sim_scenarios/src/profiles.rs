//! Domain profiles: read-only presets per application area.
//!
//! A [`ProfileCatalog`] holds the built-in profiles and, optionally, extra
//! profiles loaded from a TOML file. It is built once when the engine starts
//! and shared read-only afterwards.
//!
//! ## File Format
//!
//! ```toml
//! [[profiles]]
//! name = "grid_outage"
//! domain = "energy"
//! description = "Regional grid outage exposure"
//! primary_outcome = "outage_hours"
//!
//! [[profiles.variables]]
//! name = "faults"
//! distribution = { family = "poisson", lambda = 3.0 }
//!
//! [[profiles.outcomes]]
//! name = "outage_hours"
//! weights = { faults = 4.0 }
//!
//! [profiles.thresholds.outage_hours]
//! value = 20.0
//! breach = "above"
//! ```

use crate::error::ScenarioError;
use crate::outcome::{LossOrientation, Outcome, RiskThreshold};
use crate::scenario::{Scenario, ScenarioDefinition, ScenarioOrigin};
use crate::variable::VariableSpec;
use serde::{Deserialize, Serialize};
use sim_core::correlation::{CorrelationPair, CorrelationSpec};
use sim_core::distributions::Distribution;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Named preset of variables, correlations, outcomes and thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainProfile {
    /// Profile name
    pub name: String,
    /// Application domain, copied onto variables without a domain tag
    pub domain: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Default variables
    pub variables: Vec<VariableSpec>,
    /// Default correlation assumptions
    #[serde(default)]
    pub correlation: CorrelationSpec,
    /// Derived outcomes
    #[serde(default)]
    pub outcomes: Vec<Outcome>,
    /// Default thresholds
    #[serde(default)]
    pub thresholds: BTreeMap<String, RiskThreshold>,
    /// Column used for loss metrics
    #[serde(default)]
    pub primary_outcome: Option<String>,
    /// Loss direction of the primary outcome
    #[serde(default)]
    pub orientation: LossOrientation,
}

impl DomainProfile {
    /// Scenario definition with the profile defaults.
    pub fn to_definition(&self) -> ScenarioDefinition {
        let variables = self
            .variables
            .iter()
            .cloned()
            .map(|mut v| {
                v.domain.get_or_insert_with(|| self.domain.clone());
                v
            })
            .collect();
        ScenarioDefinition {
            name: self.name.clone(),
            description: (!self.description.is_empty()).then(|| self.description.clone()),
            variables,
            correlation: self.correlation.clone(),
            copula: None,
            outcomes: self.outcomes.clone(),
            thresholds: self.thresholds.clone(),
            primary_outcome: self.primary_outcome.clone(),
            orientation: self.orientation,
        }
    }

    /// Checks that the defaults form a valid scenario.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        Scenario::from_definition(self.to_definition(), ScenarioOrigin::Profile(self.name.clone()))
            .map(|_| ())
    }
}

#[derive(Debug, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    profiles: Vec<DomainProfile>,
}

/// Read-only collection of domain profiles.
///
/// # Examples
///
/// ```rust
/// use sim_scenarios::ProfileCatalog;
///
/// let catalog = ProfileCatalog::builtin();
/// let profile = catalog.get("financial_portfolio").unwrap();
/// assert_eq!(profile.variables.len(), 4);
/// assert!(catalog.names().contains(&"defense_capability"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct ProfileCatalog {
    profiles: BTreeMap<String, Arc<DomainProfile>>,
}

impl ProfileCatalog {
    /// Empty catalogue.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Catalogue of the built-in profiles.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        for profile in [
            defense_capability(),
            market_risk(),
            financial_portfolio(),
            cybersecurity_threat(),
        ] {
            catalog.profiles.insert(profile.name.clone(), Arc::new(profile));
        }
        catalog
    }

    /// Built-ins plus the profiles in `path`.
    ///
    /// A file profile with the same name as a built-in replaces it.
    pub fn with_file(path: &Path) -> Result<Self, ScenarioError> {
        let mut catalog = Self::builtin();
        catalog.load_file(path)?;
        Ok(catalog)
    }

    /// Loads and validates every profile in a TOML file.
    ///
    /// Nothing is added unless every profile in the file is valid.
    pub fn load_file(&mut self, path: &Path) -> Result<usize, ScenarioError> {
        let content = std::fs::read_to_string(path).map_err(|e| ScenarioError::profile_load(path, e))?;
        let file: ProfileFile = toml::from_str(&content).map_err(|e| ScenarioError::profile_load(path, e))?;

        for profile in &file.profiles {
            profile.validate()?;
        }
        let count = file.profiles.len();
        for profile in file.profiles {
            if self.profiles.contains_key(&profile.name) {
                tracing::info!(profile = %profile.name, path = %path.display(), "profile file overrides built-in");
            }
            self.profiles.insert(profile.name.clone(), Arc::new(profile));
        }
        tracing::info!(count, path = %path.display(), "loaded domain profiles");
        Ok(count)
    }

    /// Adds a validated profile.
    pub fn insert(&mut self, profile: DomainProfile) -> Result<(), ScenarioError> {
        profile.validate()?;
        self.profiles.insert(profile.name.clone(), Arc::new(profile));
        Ok(())
    }

    /// Looks up a profile by name.
    pub fn get(&self, name: &str) -> Option<Arc<DomainProfile>> {
        self.profiles.get(name).cloned()
    }

    /// Profile names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    /// Number of profiles.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the catalogue is empty.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn var(name: &str, distribution: Distribution, description: &str) -> VariableSpec {
    VariableSpec::new(name, distribution).described(description)
}

/// Ten independent capability factors on [0, 1] feeding a 0-100 readiness
/// score.
fn defense_capability() -> DomainProfile {
    let factors = [
        ("personnel_readiness", Distribution::Beta { alpha: 4.0, beta: 2.0 }, "Share of billets filled and deployable"),
        ("equipment_availability", Distribution::Beta { alpha: 5.0, beta: 2.5 }, "Mission-capable equipment rate"),
        ("training_level", Distribution::Beta { alpha: 3.5, beta: 2.0 }, "Completion of collective training"),
        ("logistics_support", Distribution::Beta { alpha: 3.0, beta: 2.0 }, "Supply chain responsiveness"),
        ("maintenance_status", Distribution::Beta { alpha: 4.0, beta: 2.0 }, "Maintenance backlog cleared"),
        ("intelligence_quality", Distribution::Uniform { low: 0.35, high: 0.95 }, "Timeliness and accuracy of intelligence"),
        ("command_control", Distribution::Beta { alpha: 4.5, beta: 2.0 }, "C2 system effectiveness"),
        ("cyber_resilience", Distribution::Triangular { min: 0.2, mode: 0.7, max: 1.0 }, "Resistance to cyber disruption"),
        ("interoperability", Distribution::Beta { alpha: 3.0, beta: 2.0 }, "Ability to operate with partners"),
        ("sustainment_capacity", Distribution::Beta { alpha: 3.5, beta: 2.0 }, "Endurance without resupply"),
    ];
    let mut outcome = Outcome::new("readiness_score").described("Overall readiness on a 0-100 scale");
    for (name, _, _) in &factors {
        outcome = outcome.with_weight(*name, 10.0);
    }
    let mut thresholds = BTreeMap::new();
    thresholds.insert("readiness_score".to_string(), RiskThreshold::below(60.0));

    DomainProfile {
        name: "defense_capability".into(),
        domain: "defense".into(),
        description: "Defense capability assessment over ten independent readiness factors".into(),
        variables: factors
            .into_iter()
            .map(|(name, dist, description)| var(name, dist, description))
            .collect(),
        correlation: CorrelationSpec::Independent,
        outcomes: vec![outcome],
        thresholds,
        primary_outcome: Some("readiness_score".into()),
        orientation: LossOrientation::LowerIsWorse,
    }
}

fn market_risk() -> DomainProfile {
    let mut thresholds = BTreeMap::new();
    thresholds.insert("margin_index".to_string(), RiskThreshold::below(70.0));

    DomainProfile {
        name: "market_risk".into(),
        domain: "business".into(),
        description: "Business exposure to demand, pricing, cost and competition".into(),
        variables: vec![
            var("demand", Distribution::Normal { mean: 10_000.0, std_dev: 1_500.0 }, "Units sold per period"),
            var("price", Distribution::LogNormal { mu: 3.912, sigma: 0.1 }, "Average selling price"),
            var("unit_cost", Distribution::Normal { mean: 30.0, std_dev: 3.0 }, "Variable cost per unit"),
            var("competition_intensity", Distribution::Beta { alpha: 2.0, beta: 3.0 }, "Competitive pressure"),
        ],
        correlation: CorrelationSpec::Pairwise {
            pairs: vec![
                CorrelationPair::new("demand", "price", -0.4),
                CorrelationPair::new("price", "competition_intensity", -0.3),
                CorrelationPair::new("unit_cost", "price", 0.2),
            ],
        },
        outcomes: vec![Outcome::new("margin_index")
            .with_weight("demand", 0.01)
            .with_weight("price", 2.0)
            .with_weight("unit_cost", -3.0)
            .with_weight("competition_intensity", -40.0)
            .described("Operating margin index")],
        thresholds,
        primary_outcome: Some("margin_index".into()),
        orientation: LossOrientation::LowerIsWorse,
    }
}

fn financial_portfolio() -> DomainProfile {
    let mut thresholds = BTreeMap::new();
    thresholds.insert("portfolio_return".to_string(), RiskThreshold::below(-0.10));

    DomainProfile {
        name: "financial_portfolio".into(),
        domain: "financial".into(),
        description: "Multi-asset portfolio driven by correlated macro factors".into(),
        variables: vec![
            var("market_return", Distribution::Normal { mean: 0.07, std_dev: 0.15 }, "Annual equity market return"),
            var("interest_rate", Distribution::Normal { mean: 0.03, std_dev: 0.01 }, "Short-term policy rate"),
            var("inflation", Distribution::Normal { mean: 0.025, std_dev: 0.008 }, "Annual CPI inflation"),
            var("volatility", Distribution::LogNormal { mu: -1.715, sigma: 0.25 }, "Implied market volatility"),
        ],
        correlation: CorrelationSpec::Explicit {
            variables: vec![
                "market_return".into(),
                "interest_rate".into(),
                "inflation".into(),
                "volatility".into(),
            ],
            matrix: vec![
                vec![1.0, -0.3, -0.2, -0.6],
                vec![-0.3, 1.0, 0.6, 0.2],
                vec![-0.2, 0.6, 1.0, 0.1],
                vec![-0.6, 0.2, 0.1, 1.0],
            ],
        },
        outcomes: vec![Outcome::new("portfolio_return")
            .with_weight("market_return", 0.6)
            .with_weight("interest_rate", 0.3)
            .with_weight("inflation", -0.2)
            .with_weight("volatility", -0.1)
            .described("Annual portfolio return")],
        thresholds,
        primary_outcome: Some("portfolio_return".into()),
        orientation: LossOrientation::LowerIsWorse,
    }
}

fn cybersecurity_threat() -> DomainProfile {
    let mut thresholds = BTreeMap::new();
    thresholds.insert("incident_loss".to_string(), RiskThreshold::above(750_000.0));

    DomainProfile {
        name: "cybersecurity_threat".into(),
        domain: "cybersecurity".into(),
        description: "Annual cyber incident exposure".into(),
        variables: vec![
            var("attack_frequency", Distribution::Poisson { lambda: 12.0 }, "Material attacks per year"),
            var("detection_rate", Distribution::Beta { alpha: 7.0, beta: 3.0 }, "Share of attacks detected early"),
            var("response_time_hours", Distribution::Gamma { shape: 2.0, scale: 6.0 }, "Hours to contain an incident"),
            var("breach_impact", Distribution::LogNormal { mu: 12.43, sigma: 0.8 }, "Cost of a successful breach"),
        ],
        correlation: CorrelationSpec::Pairwise {
            pairs: vec![
                CorrelationPair::new("attack_frequency", "breach_impact", 0.2),
                CorrelationPair::new("detection_rate", "response_time_hours", -0.5),
            ],
        },
        outcomes: vec![Outcome::new("incident_loss")
            .with_weight("attack_frequency", 5_000.0)
            .with_weight("detection_rate", -200_000.0)
            .with_weight("response_time_hours", 3_000.0)
            .with_weight("breach_impact", 1.0)
            .with_intercept(100_000.0)
            .described("Annual loss from cyber incidents")],
        thresholds,
        primary_outcome: Some("incident_loss".into()),
        orientation: LossOrientation::HigherIsWorse,
    }
}
