//! Parameterised probability distributions.

use super::compiled::CompiledDistribution;
use super::family::DistributionFamily;
use crate::types::ValidationError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::function::gamma::gamma;
use std::fmt;

/// A probability family together with its parameters.
///
/// Parameters are checked by [`validate`](Self::validate) before any sampling
/// happens; [`sample`](Self::sample) and [`compile`](Self::compile) validate
/// implicitly.
///
/// # Examples
///
/// ```rust
/// use sim_core::distributions::Distribution;
///
/// let bad = Distribution::Gamma { shape: -1.0, scale: 2.0 };
/// assert!(bad.validate().is_err());
///
/// let ok = Distribution::Weibull { shape: 1.5, scale: 10.0 };
/// assert!(ok.validate().is_ok());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Distribution {
    /// Gaussian.
    Normal {
        /// Mean
        mean: f64,
        /// Standard deviation (> 0)
        std_dev: f64,
    },
    /// Log-normal: `exp(N(mu, sigma))`.
    LogNormal {
        /// Mean of the underlying normal
        mu: f64,
        /// Standard deviation of the underlying normal (> 0)
        sigma: f64,
    },
    /// Continuous uniform on `[low, high)`.
    Uniform {
        /// Lower bound
        low: f64,
        /// Upper bound (> low)
        high: f64,
    },
    /// Exponential.
    Exponential {
        /// Rate λ (> 0)
        rate: f64,
    },
    /// Gamma.
    Gamma {
        /// Shape k (> 0)
        shape: f64,
        /// Scale θ (> 0)
        scale: f64,
    },
    /// Beta on [0, 1].
    Beta {
        /// First shape α (> 0)
        alpha: f64,
        /// Second shape β (> 0)
        beta: f64,
    },
    /// Weibull.
    Weibull {
        /// Shape k (> 0)
        shape: f64,
        /// Scale λ (> 0)
        scale: f64,
    },
    /// Poisson counts.
    Poisson {
        /// Rate λ (> 0)
        lambda: f64,
    },
    /// Triangular.
    Triangular {
        /// Lower bound
        min: f64,
        /// Most likely value (min ≤ mode ≤ max)
        mode: f64,
        /// Upper bound (> min)
        max: f64,
    },
}

/// Addressable distribution parameter, used by parameter drift.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKey {
    /// Normal mean
    Mean,
    /// Normal standard deviation
    StdDev,
    /// Log-normal location
    Mu,
    /// Log-normal scale
    Sigma,
    /// Uniform lower bound
    Low,
    /// Uniform upper bound
    High,
    /// Exponential rate
    Rate,
    /// Gamma/Weibull shape
    Shape,
    /// Gamma/Weibull scale
    Scale,
    /// Beta α
    Alpha,
    /// Beta β
    Beta,
    /// Poisson λ
    Lambda,
    /// Triangular lower bound
    Min,
    /// Triangular mode
    Mode,
    /// Triangular upper bound
    Max,
    /// Shifts every location-type parameter of the family at once
    /// (normal mean, log-normal mu, uniform and triangular bounds).
    Location,
}

impl ParamKey {
    /// Snake-case name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::StdDev => "std_dev",
            Self::Mu => "mu",
            Self::Sigma => "sigma",
            Self::Low => "low",
            Self::High => "high",
            Self::Rate => "rate",
            Self::Shape => "shape",
            Self::Scale => "scale",
            Self::Alpha => "alpha",
            Self::Beta => "beta",
            Self::Lambda => "lambda",
            Self::Min => "min",
            Self::Mode => "mode",
            Self::Max => "max",
            Self::Location => "location",
        }
    }
}

/// Closed interval containing every possible sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Support {
    /// Inclusive lower bound
    pub lower: f64,
    /// Inclusive upper bound
    pub upper: f64,
    /// Whether samples are integers
    pub integer: bool,
}

impl Support {
    /// Whether `x` is a possible sample.
    pub fn contains(&self, x: f64) -> bool {
        x >= self.lower && x <= self.upper && (!self.integer || x.fract() == 0.0)
    }
}

fn finite(family: &'static str, name: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::parameter(family, name, format!("must be finite, got {}", value)))
    }
}

fn positive(family: &'static str, name: &'static str, value: f64) -> Result<(), ValidationError> {
    finite(family, name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::parameter(family, name, format!("must be positive, got {}", value)))
    }
}

fn finite_width(family: &'static str, name: &'static str, lower: f64, upper: f64) -> Result<(), ValidationError> {
    let width = upper - lower;
    if width.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::parameter(
            family,
            name,
            format!("range [{}, {}] is too wide to represent", lower, upper),
        ))
    }
}

impl Distribution {
    /// Family tag of this distribution.
    pub fn family(&self) -> DistributionFamily {
        match self {
            Self::Normal { .. } => DistributionFamily::Normal,
            Self::LogNormal { .. } => DistributionFamily::LogNormal,
            Self::Uniform { .. } => DistributionFamily::Uniform,
            Self::Exponential { .. } => DistributionFamily::Exponential,
            Self::Gamma { .. } => DistributionFamily::Gamma,
            Self::Beta { .. } => DistributionFamily::Beta,
            Self::Weibull { .. } => DistributionFamily::Weibull,
            Self::Poisson { .. } => DistributionFamily::Poisson,
            Self::Triangular { .. } => DistributionFamily::Triangular,
        }
    }

    /// Checks the parameters against the family's support.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidParameter` naming the first offending
    /// parameter.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let family = self.family().name();
        match *self {
            Self::Normal { mean, std_dev } => {
                finite(family, "mean", mean)?;
                positive(family, "std_dev", std_dev)
            }
            Self::LogNormal { mu, sigma } => {
                finite(family, "mu", mu)?;
                positive(family, "sigma", sigma)
            }
            Self::Uniform { low, high } => {
                finite(family, "low", low)?;
                finite(family, "high", high)?;
                if low >= high {
                    return Err(ValidationError::parameter(
                        family,
                        "high",
                        format!("must exceed low ({}), got {}", low, high),
                    ));
                }
                finite_width(family, "high", low, high)
            }
            Self::Exponential { rate } => positive(family, "rate", rate),
            Self::Gamma { shape, scale } | Self::Weibull { shape, scale } => {
                positive(family, "shape", shape)?;
                positive(family, "scale", scale)
            }
            Self::Beta { alpha, beta } => {
                positive(family, "alpha", alpha)?;
                positive(family, "beta", beta)
            }
            Self::Poisson { lambda } => positive(family, "lambda", lambda),
            Self::Triangular { min, mode, max } => {
                finite(family, "min", min)?;
                finite(family, "mode", mode)?;
                finite(family, "max", max)?;
                if min >= max {
                    return Err(ValidationError::parameter(
                        family,
                        "max",
                        format!("must exceed min ({}), got {}", min, max),
                    ));
                }
                finite_width(family, "max", min, max)?;
                if mode < min || mode > max {
                    return Err(ValidationError::parameter(
                        family,
                        "mode",
                        format!("must lie in [{}, {}], got {}", min, max, mode),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Validates and pre-builds the sampler and quantile function.
    pub fn compile(&self) -> Result<CompiledDistribution, ValidationError> {
        CompiledDistribution::new(*self)
    }

    /// Draws `count` samples from `rng`.
    ///
    /// Validation happens before the first draw, so an invalid parameter set
    /// never consumes random numbers.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sim_core::distributions::Distribution;
    /// use sim_core::rng::SimRng;
    ///
    /// let dist = Distribution::Poisson { lambda: 3.0 };
    /// let mut rng = SimRng::from_seed(1);
    /// let counts = dist.sample(100, &mut rng).unwrap();
    /// assert!(counts.iter().all(|c| c.fract() == 0.0 && *c >= 0.0));
    /// ```
    pub fn sample<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Result<Vec<f64>, ValidationError> {
        let compiled = self.compile()?;
        Ok((0..count).map(|_| compiled.draw(rng)).collect())
    }

    /// Draws a single sample.
    pub fn sample_one<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64, ValidationError> {
        Ok(self.compile()?.draw(rng))
    }

    /// Quantile function `F⁻¹(p)` for `p` in (0, 1).
    pub fn inverse_cdf(&self, p: f64) -> Result<f64, ValidationError> {
        Ok(self.compile()?.quantile(p))
    }

    /// Analytical mean.
    pub fn mean(&self) -> f64 {
        match *self {
            Self::Normal { mean, .. } => mean,
            Self::LogNormal { mu, sigma } => (mu + 0.5 * sigma * sigma).exp(),
            Self::Uniform { low, high } => 0.5 * (low + high),
            Self::Exponential { rate } => 1.0 / rate,
            Self::Gamma { shape, scale } => shape * scale,
            Self::Beta { alpha, beta } => alpha / (alpha + beta),
            Self::Weibull { shape, scale } => scale * gamma(1.0 + 1.0 / shape),
            Self::Poisson { lambda } => lambda,
            Self::Triangular { min, mode, max } => (min + mode + max) / 3.0,
        }
    }

    /// Interval containing every possible sample.
    pub fn support(&self) -> Support {
        let (lower, upper) = match *self {
            Self::Normal { .. } => (f64::NEG_INFINITY, f64::INFINITY),
            Self::LogNormal { .. }
            | Self::Exponential { .. }
            | Self::Gamma { .. }
            | Self::Weibull { .. }
            | Self::Poisson { .. } => (0.0, f64::INFINITY),
            Self::Uniform { low, high } => (low, high),
            Self::Beta { .. } => (0.0, 1.0),
            Self::Triangular { min, max, .. } => (min, max),
        };
        Support {
            lower,
            upper,
            integer: self.family().is_discrete(),
        }
    }

    /// Returns a copy with `delta` added to one parameter.
    ///
    /// [`ParamKey::Location`] shifts the family's location parameters together
    /// and is only defined for normal, log-normal, uniform and triangular.
    ///
    /// # Errors
    ///
    /// `ValidationError::UnsupportedParameter` if the family has no such
    /// parameter; `ValidationError::InvalidParameter` if the shifted value
    /// leaves the support.
    pub fn with_param_offset(&self, key: ParamKey, delta: f64) -> Result<Self, ValidationError> {
        use ParamKey as K;
        let shifted = match (*self, key) {
            (Self::Normal { mean, std_dev }, K::Mean | K::Location) => Self::Normal {
                mean: mean + delta,
                std_dev,
            },
            (Self::Normal { mean, std_dev }, K::StdDev) => Self::Normal {
                mean,
                std_dev: std_dev + delta,
            },
            (Self::LogNormal { mu, sigma }, K::Mu | K::Location) => Self::LogNormal {
                mu: mu + delta,
                sigma,
            },
            (Self::LogNormal { mu, sigma }, K::Sigma) => Self::LogNormal {
                mu,
                sigma: sigma + delta,
            },
            (Self::Uniform { low, high }, K::Low) => Self::Uniform { low: low + delta, high },
            (Self::Uniform { low, high }, K::High) => Self::Uniform { low, high: high + delta },
            (Self::Uniform { low, high }, K::Location) => Self::Uniform {
                low: low + delta,
                high: high + delta,
            },
            (Self::Exponential { rate }, K::Rate) => Self::Exponential { rate: rate + delta },
            (Self::Gamma { shape, scale }, K::Shape) => Self::Gamma {
                shape: shape + delta,
                scale,
            },
            (Self::Gamma { shape, scale }, K::Scale) => Self::Gamma {
                shape,
                scale: scale + delta,
            },
            (Self::Beta { alpha, beta }, K::Alpha) => Self::Beta {
                alpha: alpha + delta,
                beta,
            },
            (Self::Beta { alpha, beta }, K::Beta) => Self::Beta {
                alpha,
                beta: beta + delta,
            },
            (Self::Weibull { shape, scale }, K::Shape) => Self::Weibull {
                shape: shape + delta,
                scale,
            },
            (Self::Weibull { shape, scale }, K::Scale) => Self::Weibull {
                shape,
                scale: scale + delta,
            },
            (Self::Poisson { lambda }, K::Lambda) => Self::Poisson {
                lambda: lambda + delta,
            },
            (Self::Triangular { min, mode, max }, K::Min) => Self::Triangular {
                min: min + delta,
                mode,
                max,
            },
            (Self::Triangular { min, mode, max }, K::Mode) => Self::Triangular {
                min,
                mode: mode + delta,
                max,
            },
            (Self::Triangular { min, mode, max }, K::Max) => Self::Triangular {
                min,
                mode,
                max: max + delta,
            },
            (Self::Triangular { min, mode, max }, K::Location) => Self::Triangular {
                min: min + delta,
                mode: mode + delta,
                max: max + delta,
            },
            (other, key) => {
                return Err(ValidationError::UnsupportedParameter {
                    family: other.family().name(),
                    param: key.name(),
                })
            }
        };
        shifted.validate()?;
        Ok(shifted)
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Normal { mean, std_dev } => write!(f, "Normal(mean={}, std_dev={})", mean, std_dev),
            Self::LogNormal { mu, sigma } => write!(f, "LogNormal(mu={}, sigma={})", mu, sigma),
            Self::Uniform { low, high } => write!(f, "Uniform({}, {})", low, high),
            Self::Exponential { rate } => write!(f, "Exponential(rate={})", rate),
            Self::Gamma { shape, scale } => write!(f, "Gamma(shape={}, scale={})", shape, scale),
            Self::Beta { alpha, beta } => write!(f, "Beta(alpha={}, beta={})", alpha, beta),
            Self::Weibull { shape, scale } => write!(f, "Weibull(shape={}, scale={})", shape, scale),
            Self::Poisson { lambda } => write!(f, "Poisson(lambda={})", lambda),
            Self::Triangular { min, mode, max } => {
                write!(f, "Triangular({}, {}, {})", min, mode, max)
            }
        }
    }
}
