//! Built-in scenario templates.
//!
//! Each template supplies a domain-appropriate default variable set,
//! correlation assumptions, a derived outcome and a failure threshold.
//! Callers customise them through
//! [`ScenarioOverrides`](crate::ScenarioOverrides).

use crate::error::ScenarioError;
use crate::outcome::{LossOrientation, Outcome, RiskThreshold};
use crate::scenario::ScenarioDefinition;
use crate::variable::VariableSpec;
use sim_core::correlation::{CorrelationPair, CorrelationSpec};
use sim_core::distributions::Distribution;
use std::fmt;
use std::str::FromStr;

/// Built-in scenario template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Template {
    /// Likelihood × impact style enterprise risk register
    RiskAssessment,
    /// Task durations and rework for a delivery schedule
    ProjectPlanning,
    /// Lead times, demand and disruptions
    SupplyChain,
    /// Delivery risk of a technology programme
    TechnologyRisk,
    /// Climate and emissions exposure
    Environmental,
    /// Regulatory compliance posture
    Compliance,
}

impl Template {
    /// Every built-in template.
    pub const ALL: [Template; 6] = [
        Self::RiskAssessment,
        Self::ProjectPlanning,
        Self::SupplyChain,
        Self::TechnologyRisk,
        Self::Environmental,
        Self::Compliance,
    ];

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RiskAssessment => "risk_assessment",
            Self::ProjectPlanning => "project_planning",
            Self::SupplyChain => "supply_chain",
            Self::TechnologyRisk => "technology_risk",
            Self::Environmental => "environmental",
            Self::Compliance => "compliance",
        }
    }

    /// Default definition of this template.
    pub fn definition(&self) -> ScenarioDefinition {
        match self {
            Self::RiskAssessment => risk_assessment(),
            Self::ProjectPlanning => project_planning(),
            Self::SupplyChain => supply_chain(),
            Self::TechnologyRisk => technology_risk(),
            Self::Environmental => environmental(),
            Self::Compliance => compliance(),
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Template {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|t| t.name() == key)
            .ok_or_else(|| ScenarioError::UnknownTemplate(s.to_string()))
    }
}

fn var(name: &str, distribution: Distribution, description: &str) -> VariableSpec {
    VariableSpec::new(name, distribution).described(description)
}

fn pairs(list: &[(&str, &str, f64)]) -> CorrelationSpec {
    CorrelationSpec::Pairwise {
        pairs: list
            .iter()
            .map(|&(a, b, rho)| CorrelationPair::new(a, b, rho))
            .collect(),
    }
}

fn scenario(
    name: &str,
    description: &str,
    variables: Vec<VariableSpec>,
    correlation: CorrelationSpec,
    outcome: Outcome,
    threshold: RiskThreshold,
    orientation: LossOrientation,
) -> ScenarioDefinition {
    let mut def = ScenarioDefinition::new(name);
    def.description = Some(description.to_string());
    def.variables = variables;
    def.correlation = correlation;
    def.thresholds.insert(outcome.name.clone(), threshold);
    def.primary_outcome = Some(outcome.name.clone());
    def.outcomes = vec![outcome];
    def.orientation = orientation;
    def
}

fn risk_assessment() -> ScenarioDefinition {
    scenario(
        "risk_assessment",
        "Enterprise risk register: likelihood, vulnerability, impact and controls",
        vec![
            var("threat_likelihood", Distribution::Beta { alpha: 2.0, beta: 5.0 }, "Annual probability a threat materialises"),
            var("vulnerability", Distribution::Beta { alpha: 3.0, beta: 4.0 }, "Exposure of assets to the threat"),
            var("impact_severity", Distribution::Triangular { min: 1.0, mode: 4.0, max: 10.0 }, "Severity on a 1-10 scale"),
            var("control_effectiveness", Distribution::Beta { alpha: 5.0, beta: 2.0 }, "Share of incidents stopped by controls"),
        ],
        pairs(&[
            ("threat_likelihood", "vulnerability", 0.3),
            ("vulnerability", "control_effectiveness", -0.4),
        ]),
        Outcome::new("risk_score")
            .with_weight("threat_likelihood", 30.0)
            .with_weight("vulnerability", 25.0)
            .with_weight("impact_severity", 4.0)
            .with_weight("control_effectiveness", -20.0)
            .described("Composite risk score"),
        RiskThreshold::above(35.0),
        LossOrientation::HigherIsWorse,
    )
}

fn project_planning() -> ScenarioDefinition {
    scenario(
        "project_planning",
        "Delivery schedule with three-point task estimates and rework",
        vec![
            var("design_days", Distribution::Triangular { min: 10.0, mode: 15.0, max: 25.0 }, "Design phase duration"),
            var("build_days", Distribution::Triangular { min: 20.0, mode: 30.0, max: 50.0 }, "Build phase duration"),
            var("test_days", Distribution::Triangular { min: 5.0, mode: 10.0, max: 20.0 }, "Test phase duration"),
            var("rework_days", Distribution::Exponential { rate: 0.2 }, "Unplanned rework"),
        ],
        pairs(&[("design_days", "build_days", 0.3), ("build_days", "test_days", 0.5)]),
        Outcome::new("total_duration")
            .with_weight("design_days", 1.0)
            .with_weight("build_days", 1.0)
            .with_weight("test_days", 1.0)
            .with_weight("rework_days", 1.0)
            .described("End-to-end duration in days"),
        RiskThreshold::above(80.0),
        LossOrientation::HigherIsWorse,
    )
}

fn supply_chain() -> ScenarioDefinition {
    scenario(
        "supply_chain",
        "Inbound supply with lead-time variability and disruptions",
        vec![
            var("supplier_lead_time", Distribution::Gamma { shape: 4.0, scale: 3.0 }, "Lead time in days"),
            var("demand", Distribution::Normal { mean: 1_000.0, std_dev: 150.0 }, "Units demanded per cycle"),
            var("disruption_events", Distribution::Poisson { lambda: 1.5 }, "Disruptions per cycle"),
            var("inventory_buffer", Distribution::Uniform { low: 200.0, high: 600.0 }, "Safety stock in units"),
        ],
        pairs(&[("supplier_lead_time", "disruption_events", 0.4)]),
        Outcome::new("service_shortfall")
            .with_weight("demand", 1.0)
            .with_weight("inventory_buffer", -1.0)
            .with_weight("disruption_events", 50.0)
            .with_weight("supplier_lead_time", 5.0)
            .described("Units at risk of not being served"),
        RiskThreshold::above(900.0),
        LossOrientation::HigherIsWorse,
    )
}

fn technology_risk() -> ScenarioDefinition {
    scenario(
        "technology_risk",
        "Delivery risk of a technology programme",
        vec![
            var("system_uptime", Distribution::Beta { alpha: 50.0, beta: 1.0 }, "Availability of the platform"),
            var("defect_rate", Distribution::Gamma { shape: 2.0, scale: 0.5 }, "Defects per thousand lines"),
            var("integration_complexity", Distribution::Triangular { min: 1.0, mode: 5.0, max: 10.0 }, "Integration complexity score"),
            var("team_experience", Distribution::Uniform { low: 1.0, high: 10.0 }, "Average years of experience"),
            var("technical_debt", Distribution::Weibull { shape: 1.5, scale: 20.0 }, "Backlog of debt items"),
        ],
        pairs(&[
            ("integration_complexity", "defect_rate", 0.5),
            ("team_experience", "defect_rate", -0.4),
            ("technical_debt", "defect_rate", 0.3),
        ]),
        Outcome::new("delivery_risk")
            .with_intercept(60.0)
            .with_weight("defect_rate", 10.0)
            .with_weight("integration_complexity", 3.0)
            .with_weight("team_experience", -2.0)
            .with_weight("technical_debt", 0.5)
            .with_weight("system_uptime", -50.0)
            .described("Programme delivery risk index"),
        RiskThreshold::above(45.0),
        LossOrientation::HigherIsWorse,
    )
}

fn environmental() -> ScenarioDefinition {
    scenario(
        "environmental",
        "Physical climate exposure and emissions",
        vec![
            var("temperature_anomaly", Distribution::Normal { mean: 1.2, std_dev: 0.4 }, "Degrees above baseline"),
            var("rainfall_deficit", Distribution::Gamma { shape: 2.0, scale: 40.0 }, "Rainfall shortfall in mm"),
            var("extreme_events", Distribution::Poisson { lambda: 3.0 }, "Extreme weather events per year"),
            var("emissions", Distribution::LogNormal { mu: 4.0, sigma: 0.3 }, "Emissions in kt CO2e"),
            var("mitigation_spend", Distribution::Uniform { low: 0.0, high: 100.0 }, "Mitigation budget"),
        ],
        pairs(&[
            ("temperature_anomaly", "rainfall_deficit", 0.4),
            ("temperature_anomaly", "extreme_events", 0.5),
        ]),
        Outcome::new("environmental_impact")
            .with_weight("temperature_anomaly", 20.0)
            .with_weight("rainfall_deficit", 0.1)
            .with_weight("extreme_events", 5.0)
            .with_weight("emissions", 0.2)
            .with_weight("mitigation_spend", -0.1)
            .described("Composite environmental impact index"),
        RiskThreshold::above(70.0),
        LossOrientation::HigherIsWorse,
    )
}

fn compliance() -> ScenarioDefinition {
    scenario(
        "compliance",
        "Regulatory compliance posture",
        vec![
            var("control_coverage", Distribution::Beta { alpha: 8.0, beta: 2.0 }, "Share of obligations with tested controls"),
            var("audit_findings", Distribution::Poisson { lambda: 4.0 }, "Findings per audit cycle"),
            var("regulatory_changes", Distribution::Poisson { lambda: 2.0 }, "New obligations per cycle"),
            var("remediation_days", Distribution::Gamma { shape: 3.0, scale: 10.0 }, "Days to close findings"),
            var("staff_training_hours", Distribution::Normal { mean: 40.0, std_dev: 10.0 }, "Training hours per person"),
        ],
        pairs(&[
            ("control_coverage", "audit_findings", -0.5),
            ("staff_training_hours", "control_coverage", 0.4),
        ]),
        Outcome::new("compliance_score")
            .with_weight("control_coverage", 100.0)
            .with_weight("audit_findings", -3.0)
            .with_weight("regulatory_changes", -2.0)
            .with_weight("remediation_days", -0.2)
            .with_weight("staff_training_hours", 0.2)
            .described("Compliance health score"),
        RiskThreshold::below(55.0),
        LossOrientation::LowerIsWorse,
    )
}
