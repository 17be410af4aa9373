//! # sim_risk: Risk Analytics (Layer 3)
//!
//! Turns a completed sample matrix into decision-ready risk measures.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              sim_risk (L3)              │
//! ├─────────────────────────────────────────┤
//! │  statistics - per-column summaries      │
//! │  metrics    - VaR, CVaR, PoF            │
//! │  analysis   - cases, failure modes,     │
//! │               prioritisation            │
//! │  analyzer   - RiskAnalyzer entry point  │
//! └─────────────────────────────────────────┘
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │    sim_scenarios (L2) / sim_core (L1)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Per-column statistics run in parallel with Rayon; every column is reduced
//! on its own, so results are identical for any thread count.
//!
//! ## Example
//!
//! ```
//! use sim_core::types::SampleMatrix;
//! use sim_risk::{AnalysisTarget, RiskAnalyzer};
//! use sim_scenarios::LossOrientation;
//!
//! let returns = vec![0.05, -0.12, 0.02, 0.08, -0.03];
//! let samples = SampleMatrix::from_columns(vec!["ret".into()], vec![returns]).unwrap();
//! let target = AnalysisTarget {
//!     primary: "ret".into(),
//!     orientation: LossOrientation::LowerIsWorse,
//!     thresholds: Default::default(),
//!     inputs: vec![],
//! };
//!
//! let summary = RiskAnalyzer::new(0.9).unwrap().analyse_target(&samples, &target).unwrap();
//! assert_eq!(summary.cases.worst_case.outcome, -0.12);
//! assert!(summary.metrics.var() > 0.0);
//! ```

#![warn(missing_docs)]

pub mod analysis;
mod analyzer;
mod error;
pub mod metrics;
pub mod statistics;

pub use analysis::{CaseAnalysis, CaseSnapshot, FailureMode, FailureModeAnalysis, RiskPriority};
pub use analyzer::{AnalysisTarget, RiskAnalyzer, RiskSummary};
pub use error::RiskError;
pub use metrics::{BreachProfile, RiskMetrics, TailRisk, DEFAULT_VAR_CONFIDENCE};
pub use statistics::{ConfidenceInterval, Percentiles, VariableSummary};
