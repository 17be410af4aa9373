//! # sim_scenarios: Scenario Layer for the Monte Carlo Risk Engine
//!
//! ## Layer 2 (Scenarios) Role
//!
//! sim_scenarios turns declarative descriptions into validated, immutable
//! [`Scenario`]s:
//! - [`Variable`]: a named input with a validated distribution and optional
//!   deterministic [`ParameterDrift`]
//! - [`Outcome`] / [`RiskThreshold`]: derived columns and failure rules
//! - [`Template`]: six built-in scenario templates
//! - [`ProfileCatalog`] / [`DomainProfile`]: read-only domain presets,
//!   built-in or loaded from TOML
//! - [`ScenarioGenerator`]: composes the above with caller
//!   [`ScenarioOverrides`]
//!
//! Scenarios are shared as `Arc<Scenario>` and are never mutated after
//! creation. Each carries a blake3 content hash of its canonical definition,
//! which the engine uses as part of its cache key.
//!
//! ## Usage Example
//!
//! ```rust
//! use sim_scenarios::{ScenarioGenerator, ScenarioSource};
//!
//! let generator = ScenarioGenerator::with_builtin_profiles();
//! let source: ScenarioSource = serde_json::from_str(r#"{"profile": "financial_portfolio"}"#).unwrap();
//! let scenario = generator.generate(&source).unwrap();
//!
//! assert_eq!(scenario.primary_outcome(), "portfolio_return");
//! assert_eq!(scenario.content_hash().len(), 64);
//! ```

#![warn(missing_docs)]

mod error;
mod generator;
mod outcome;
mod profiles;
mod scenario;
mod templates;
mod variable;

pub use error::ScenarioError;
pub use generator::{ScenarioGenerator, ScenarioOverrides, ScenarioSource};
pub use outcome::{Breach, LossOrientation, Outcome, RiskThreshold};
pub use profiles::{DomainProfile, ProfileCatalog};
pub use scenario::{Scenario, ScenarioDefinition, ScenarioMetadata, ScenarioOrigin};
pub use templates::Template;
pub use variable::{DriftClock, ParameterDrift, Variable, VariableSpec};
