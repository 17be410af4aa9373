//! Closed set of supported probability families.

use crate::types::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tag of a supported probability family.
///
/// Every family is bound to its validation, sampling and quantile code through
/// exhaustive `match` statements on [`Distribution`](super::Distribution), so a
/// family added here without an implementation fails to compile rather than
/// failing at sample time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionFamily {
    /// Gaussian with mean and standard deviation.
    Normal,
    /// Exponential of a Gaussian.
    LogNormal,
    /// Continuous uniform on an interval.
    Uniform,
    /// Exponential with a rate.
    Exponential,
    /// Gamma with shape and scale.
    Gamma,
    /// Beta on [0, 1].
    Beta,
    /// Weibull with shape and scale.
    Weibull,
    /// Poisson counts.
    Poisson,
    /// Triangular with min, mode and max.
    Triangular,
}

impl DistributionFamily {
    /// Every registered family.
    pub const ALL: [DistributionFamily; 9] = [
        Self::Normal,
        Self::LogNormal,
        Self::Uniform,
        Self::Exponential,
        Self::Gamma,
        Self::Beta,
        Self::Weibull,
        Self::Poisson,
        Self::Triangular,
    ];

    /// Canonical lower-case name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::LogNormal => "log_normal",
            Self::Uniform => "uniform",
            Self::Exponential => "exponential",
            Self::Gamma => "gamma",
            Self::Beta => "beta",
            Self::Weibull => "weibull",
            Self::Poisson => "poisson",
            Self::Triangular => "triangular",
        }
    }

    /// Whether samples of this family are integer-valued.
    pub fn is_discrete(&self) -> bool {
        matches!(self, Self::Poisson)
    }
}

impl fmt::Display for DistributionFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistributionFamily {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "normal" | "gaussian" => Ok(Self::Normal),
            "log_normal" | "lognormal" => Ok(Self::LogNormal),
            "uniform" => Ok(Self::Uniform),
            "exponential" | "exp" => Ok(Self::Exponential),
            "gamma" => Ok(Self::Gamma),
            "beta" => Ok(Self::Beta),
            "weibull" => Ok(Self::Weibull),
            "poisson" => Ok(Self::Poisson),
            "triangular" => Ok(Self::Triangular),
            _ => Err(ValidationError::UnknownFamily(s.to_string())),
        }
    }
}
