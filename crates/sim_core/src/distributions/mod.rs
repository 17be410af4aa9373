//! Probability distributions for Monte Carlo inputs.
//!
//! This module provides the closed set of families a scenario variable can
//! draw from. Dispatch is by enum, never by string lookup at sample time:
//! names are parsed once at the boundary with [`DistributionFamily::from_str`].
//!
//! ## Available Families
//!
//! | Family | Parameters | Support |
//! |---|---|---|
//! | normal | `mean`, `std_dev > 0` | ℝ |
//! | log_normal | `mu`, `sigma > 0` | (0, ∞) |
//! | uniform | `low < high` | [low, high) |
//! | exponential | `rate > 0` | [0, ∞) |
//! | gamma | `shape > 0`, `scale > 0` | (0, ∞) |
//! | beta | `alpha > 0`, `beta > 0` | [0, 1] |
//! | weibull | `shape > 0`, `scale > 0` | [0, ∞) |
//! | poisson | `lambda > 0` | ℕ |
//! | triangular | `min ≤ mode ≤ max`, `min < max` | [min, max] |
//!
//! ## Sampling Paths
//!
//! - Independent variables draw directly via [`CompiledDistribution::draw`]
//! - Correlated variables go through a copula and map uniforms back with
//!   [`CompiledDistribution::quantile`]
//!
//! ## Example
//!
//! ```
//! use sim_core::distributions::{Distribution, DistributionFamily, ParamKey};
//!
//! let family: DistributionFamily = "gaussian".parse().unwrap();
//! assert_eq!(family, DistributionFamily::Normal);
//!
//! let base = Distribution::Normal { mean: 0.0, std_dev: 1.0 };
//! let shifted = base.with_param_offset(ParamKey::Mean, 2.5).unwrap();
//! assert_eq!(shifted.mean(), 2.5);
//! ```
//!
//! [`DistributionFamily::from_str`]: std::str::FromStr::from_str

mod compiled;
mod distribution;
mod family;
pub mod special;


pub use compiled::CompiledDistribution;
pub use distribution::{Distribution, ParamKey, Support};
pub use family::DistributionFamily;
