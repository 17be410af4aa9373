//! Integration tests for scenario generation across templates, profiles and
//! profile files.

use sim_core::distributions::{Distribution, ParamKey};
use sim_scenarios::{
    DriftClock, ParameterDrift, ProfileCatalog, RiskThreshold, ScenarioError, ScenarioGenerator,
    ScenarioOverrides, ScenarioSource, Template, VariableSpec,
};
use std::io::Write;
use std::sync::Arc;

// =============================================================================
// Templates
// =============================================================================

#[test]
fn test_six_templates_generate() {
    let generator = ScenarioGenerator::default();
    let names: Vec<_> = Template::ALL
        .iter()
        .map(|t| {
            generator
                .from_template(*t, &ScenarioOverrides::default())
                .unwrap()
                .name()
                .to_string()
        })
        .collect();
    assert_eq!(
        names,
        vec![
            "risk_assessment",
            "project_planning",
            "supply_chain",
            "technology_risk",
            "environmental",
            "compliance"
        ]
    );
}

#[test]
fn test_generation_is_deterministic() {
    let generator = ScenarioGenerator::default();
    let a = generator.from_template(Template::RiskAssessment, &ScenarioOverrides::default()).unwrap();
    let b = generator.from_template(Template::RiskAssessment, &ScenarioOverrides::default()).unwrap();
    assert_eq!(a.content_hash(), b.content_hash());
    assert_eq!(*a, *b);
}

#[test]
fn test_invalid_override_fails_fast() {
    let generator = ScenarioGenerator::default();
    let overrides = ScenarioOverrides {
        variables: vec![VariableSpec::new(
            "build_days",
            Distribution::Triangular { min: 50.0, mode: 30.0, max: 20.0 },
        )],
        ..Default::default()
    };
    let err = generator.from_template(Template::ProjectPlanning, &overrides).unwrap_err();
    assert!(matches!(err, ScenarioError::Validation(_)));
}

#[test]
fn test_drift_must_hold_across_horizon() {
    let generator = ScenarioGenerator::default();
    let mut overrides = ScenarioOverrides::default();
    overrides.drift.insert(
        "rework_days".into(),
        ParameterDrift {
            param: ParamKey::Rate,
            per_step: -0.05,
            clock: DriftClock::TimeSteps { steps: 10 },
        },
    );
    // rate 0.2 - 0.05 * 9 < 0 at the last step
    assert!(generator.from_template(Template::ProjectPlanning, &overrides).is_err());
}

// =============================================================================
// Profiles
// =============================================================================

#[test]
fn test_profile_file_extends_generator() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[[profiles]]
name = "clinic_capacity"
domain = "healthcare"
description = "Outpatient clinic capacity"
orientation = "higher_is_worse"

[[profiles.variables]]
name = "arrivals"
distribution = {{ family = "poisson", lambda = 40.0 }}

[[profiles.variables]]
name = "service_minutes"
distribution = {{ family = "log_normal", mu = 2.7, sigma = 0.3 }}

[profiles.correlation]
mode = "pairwise"
pairs = [{{ a = "arrivals", b = "service_minutes", rho = 0.25 }}]

[[profiles.outcomes]]
name = "overtime_minutes"
intercept = -480.0
weights = {{ arrivals = 15.0, service_minutes = 10.0 }}

[profiles.thresholds.overtime_minutes]
value = 120.0
breach = "above"
"#
    )
    .unwrap();

    let catalog = Arc::new(ProfileCatalog::with_file(file.path()).unwrap());
    let generator = ScenarioGenerator::new(catalog);
    let source = ScenarioSource::Profile {
        profile: "clinic_capacity".into(),
        overrides: ScenarioOverrides::default(),
    };
    let scenario = generator.generate(&source).unwrap();
    assert_eq!(scenario.primary_outcome(), "overtime_minutes");
    assert_eq!(scenario.thresholds()["overtime_minutes"], RiskThreshold::above(120.0));
    assert_eq!(scenario.variables()[0].domain(), Some("healthcare"));
    assert!(!scenario.resolve_correlation().unwrap().is_identity());
}

#[test]
fn test_malformed_profile_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[[profiles]]\nname = 3\n").unwrap();
    let err = ProfileCatalog::with_file(file.path()).unwrap_err();
    assert!(matches!(err, ScenarioError::ProfileLoad { .. }));
}
