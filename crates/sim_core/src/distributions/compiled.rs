//! Pre-validated sampler and quantile function for one distribution.

use super::distribution::Distribution;
use super::special::{clamp_probability, std_normal_quantile};
use crate::types::ValidationError;
use rand::Rng;
use rand_distr as rd;
use rand_distr::Distribution as _;
use statrs::distribution as sd;
use statrs::distribution::{ContinuousCDF, Discrete, DiscreteCDF};

/// Below this rate the Poisson quantile walks up from zero.
const POISSON_WALK_FROM_ZERO: f64 = 30.0;

/// Validated distribution with its samplers built once.
///
/// Batches compile each variable's distribution once and then draw from it
/// in the inner loop, so constructor checks are not repeated per sample.
///
/// # Examples
///
/// ```rust
/// use sim_core::distributions::Distribution;
/// use sim_core::rng::SimRng;
///
/// let compiled = Distribution::Exponential { rate: 2.0 }.compile().unwrap();
/// let mut rng = SimRng::from_seed(5);
/// assert!(compiled.draw(&mut rng) >= 0.0);
/// assert!((compiled.quantile(0.5) - 2f64.ln() / 2.0).abs() < 1e-12);
/// ```
#[derive(Clone, Debug)]
pub struct CompiledDistribution {
    spec: Distribution,
    kernel: Kernel,
}

#[derive(Clone, Debug)]
enum Kernel {
    Normal(rd::Normal<f64>),
    LogNormal(rd::LogNormal<f64>),
    Uniform(rd::Uniform<f64>),
    Exponential(rd::Exp<f64>),
    Gamma(rd::Gamma<f64>, sd::Gamma),
    Beta(rd::Beta<f64>, sd::Beta),
    Weibull(rd::Weibull<f64>),
    Poisson(rd::Poisson<f64>, sd::Poisson),
    Triangular(rd::Triangular<f64>),
}

impl CompiledDistribution {
    /// Validates `spec` and builds its samplers.
    pub fn new(spec: Distribution) -> Result<Self, ValidationError> {
        spec.validate()?;
        let family = spec.family().name();
        let err = |name: &'static str| move |e: String| ValidationError::parameter(family, name, e);

        let kernel = match spec {
            Distribution::Normal { mean, std_dev } => Kernel::Normal(
                rd::Normal::new(mean, std_dev).map_err(|e| err("std_dev")(e.to_string()))?,
            ),
            Distribution::LogNormal { mu, sigma } => Kernel::LogNormal(
                rd::LogNormal::new(mu, sigma).map_err(|e| err("sigma")(e.to_string()))?,
            ),
            Distribution::Uniform { low, high } => {
                // rand panics on an empty or unrepresentable range
                if !(low < high && (high - low).is_finite()) {
                    return Err(err("high")(format!("invalid range [{}, {}]", low, high)));
                }
                Kernel::Uniform(rd::Uniform::new(low, high))
            }
            Distribution::Exponential { rate } => {
                Kernel::Exponential(rd::Exp::new(rate).map_err(|e| err("rate")(e.to_string()))?)
            }
            Distribution::Gamma { shape, scale } => Kernel::Gamma(
                rd::Gamma::new(shape, scale).map_err(|e| err("shape")(e.to_string()))?,
                sd::Gamma::new(shape, 1.0 / scale).map_err(|e| err("scale")(e.to_string()))?,
            ),
            Distribution::Beta { alpha, beta } => Kernel::Beta(
                rd::Beta::new(alpha, beta).map_err(|e| err("alpha")(e.to_string()))?,
                sd::Beta::new(alpha, beta).map_err(|e| err("beta")(e.to_string()))?,
            ),
            Distribution::Weibull { shape, scale } => Kernel::Weibull(
                // rand_distr takes (scale, shape)
                rd::Weibull::new(scale, shape).map_err(|e| err("shape")(e.to_string()))?,
            ),
            Distribution::Poisson { lambda } => Kernel::Poisson(
                rd::Poisson::new(lambda).map_err(|e| err("lambda")(e.to_string()))?,
                sd::Poisson::new(lambda).map_err(|e| err("lambda")(e.to_string()))?,
            ),
            Distribution::Triangular { min, mode, max } => Kernel::Triangular(
                rd::Triangular::new(min, max, mode).map_err(|e| err("mode")(e.to_string()))?,
            ),
        };

        Ok(Self { spec, kernel })
    }

    /// The distribution this was compiled from.
    #[inline]
    pub fn spec(&self) -> &Distribution {
        &self.spec
    }

    /// Draws one sample.
    #[inline]
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match &self.kernel {
            Kernel::Normal(d) => d.sample(rng),
            Kernel::LogNormal(d) => d.sample(rng),
            Kernel::Uniform(d) => d.sample(rng),
            Kernel::Exponential(d) => d.sample(rng),
            Kernel::Gamma(d, _) => d.sample(rng),
            Kernel::Beta(d, _) => d.sample(rng),
            Kernel::Weibull(d) => d.sample(rng),
            Kernel::Poisson(d, _) => d.sample(rng),
            Kernel::Triangular(d) => d.sample(rng),
        }
    }

    /// Fills `out` with samples.
    #[inline]
    pub fn fill<R: Rng + ?Sized>(&self, rng: &mut R, out: &mut [f64]) {
        for value in out.iter_mut() {
            *value = self.draw(rng);
        }
    }

    /// Quantile function `F⁻¹(p)`.
    ///
    /// `p` is clamped into `(1e-12, 1 − 1e-12)` so that unbounded families
    /// return finite values.
    pub fn quantile(&self, p: f64) -> f64 {
        let p = clamp_probability(p);
        match (&self.kernel, self.spec) {
            (Kernel::Normal(_), Distribution::Normal { mean, std_dev }) => {
                mean + std_dev * std_normal_quantile(p)
            }
            (Kernel::LogNormal(_), Distribution::LogNormal { mu, sigma }) => {
                (mu + sigma * std_normal_quantile(p)).exp()
            }
            (Kernel::Uniform(_), Distribution::Uniform { low, high }) => low + p * (high - low),
            (Kernel::Exponential(_), Distribution::Exponential { rate }) => -(-p).ln_1p() / rate,
            (Kernel::Weibull(_), Distribution::Weibull { shape, scale }) => {
                scale * (-(-p).ln_1p()).powf(1.0 / shape)
            }
            (Kernel::Triangular(_), Distribution::Triangular { min, mode, max }) => {
                let width = max - min;
                let split = (mode - min) / width;
                if p < split {
                    min + (p * width * (mode - min)).sqrt()
                } else {
                    max - ((1.0 - p) * width * (max - mode)).sqrt()
                }
            }
            (Kernel::Gamma(_, q), _) => q.inverse_cdf(p),
            (Kernel::Beta(_, q), _) => q.inverse_cdf(p),
            (Kernel::Poisson(_, q), Distribution::Poisson { lambda }) => poisson_quantile(q, lambda, p),
            // kernel and spec are built together in `new`
            _ => unreachable!("kernel does not match distribution spec"),
        }
    }
}

/// Smallest `k` with `P(X <= k) >= p`.
///
/// Walks the CDF one mass point at a time, from zero for small rates and from
/// the normal approximation otherwise.
fn poisson_quantile(q: &sd::Poisson, lambda: f64, p: f64) -> f64 {
    if p <= (-lambda).exp() {
        return 0.0;
    }
    let mut k: u64 = if lambda < POISSON_WALK_FROM_ZERO {
        0
    } else {
        (lambda + lambda.sqrt() * std_normal_quantile(p)).floor().max(0.0) as u64
    };
    let mut cdf = q.cdf(k);
    if cdf >= p {
        while k > 0 {
            let below = cdf - q.pmf(k);
            if below < p {
                break;
            }
            cdf = below;
            k -= 1;
        }
    } else {
        while cdf < p {
            k += 1;
            let mass = q.pmf(k);
            // accumulated rounding can leave the sum just short of p in the far tail
            if mass == 0.0 && k as f64 > lambda {
                break;
            }
            cdf += mass;
        }
    }
    k as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SimRng;
    use approx::assert_relative_eq;

    #[test]
    fn test_compile_rejects_invalid() {
        let result = CompiledDistribution::new(Distribution::Beta {
            alpha: 0.0,
            beta: 1.0,
        });
        assert!(matches!(result, Err(ValidationError::InvalidParameter { name: "alpha", .. })));
    }

    #[test]
    fn test_closed_form_quantiles() {
        let normal = Distribution::Normal { mean: 10.0, std_dev: 2.0 }.compile().unwrap();
        assert_relative_eq!(normal.quantile(0.5), 10.0, epsilon = 1e-10);
        assert_relative_eq!(normal.quantile(0.975), 10.0 + 2.0 * 1.959964, epsilon = 1e-5);

        let uniform = Distribution::Uniform { low: 2.0, high: 4.0 }.compile().unwrap();
        assert_relative_eq!(uniform.quantile(0.25), 2.5, epsilon = 1e-12);

        let weibull = Distribution::Weibull { shape: 1.0, scale: 3.0 }.compile().unwrap();
        let exponential = Distribution::Exponential { rate: 1.0 / 3.0 }.compile().unwrap();
        assert_relative_eq!(weibull.quantile(0.7), exponential.quantile(0.7), epsilon = 1e-10);

        let tri = Distribution::Triangular { min: 0.0, mode: 0.5, max: 1.0 }.compile().unwrap();
        assert_relative_eq!(tri.quantile(0.5), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_numeric_quantiles_are_monotone() {
        let gamma = Distribution::Gamma { shape: 2.0, scale: 1.5 }.compile().unwrap();
        let beta = Distribution::Beta { alpha: 2.0, beta: 5.0 }.compile().unwrap();
        let poisson = Distribution::Poisson { lambda: 4.0 }.compile().unwrap();

        let probs = [0.01, 0.1, 0.5, 0.9, 0.99];
        for pair in probs.windows(2) {
            assert!(gamma.quantile(pair[0]) <= gamma.quantile(pair[1]));
            assert!(beta.quantile(pair[0]) <= beta.quantile(pair[1]));
            assert!(poisson.quantile(pair[0]) <= poisson.quantile(pair[1]));
        }
        assert_eq!(poisson.quantile(0.5).fract(), 0.0);
    }

    #[test]
    fn test_poisson_quantile_at_zero_mass() {
        for lambda in [0.5f64, 2.0, 4.0, 12.0] {
            let poisson = Distribution::Poisson { lambda }.compile().unwrap();
            let p_zero = (-lambda).exp();
            assert_eq!(poisson.quantile(1e-12), 0.0);
            assert_eq!(poisson.quantile(p_zero * 0.5), 0.0);
            assert_eq!(poisson.quantile(p_zero * 1.01), 1.0);
        }
        let small = Distribution::Poisson { lambda: 0.5 }.compile().unwrap();
        assert_eq!(small.quantile(0.01), 0.0);
        assert_eq!(small.quantile(0.5), 0.0);
    }

    #[test]
    fn test_poisson_quantile_matches_cdf() {
        for lambda in [1.5, 4.0, 45.0, 400.0] {
            let poisson = Distribution::Poisson { lambda }.compile().unwrap();
            let cdf = sd::Poisson::new(lambda).unwrap();
            for p in [0.001, 0.05, 0.3, 0.5, 0.8, 0.99, 1.0 - 1e-9] {
                let k = poisson.quantile(p) as u64;
                assert!(cdf.cdf(k) >= p - 1e-12, "lambda {lambda} p {p} k {k}");
                if k > 0 {
                    assert!(cdf.cdf(k - 1) < p + 1e-12, "lambda {lambda} p {p} k {k}");
                }
            }
        }
    }

    #[test]
    fn test_quantile_at_extremes_is_finite() {
        let lognormal = Distribution::LogNormal { mu: 0.0, sigma: 1.0 }.compile().unwrap();
        assert!(lognormal.quantile(0.0).is_finite());
        assert!(lognormal.quantile(1.0).is_finite());
    }

    #[test]
    fn test_fill_matches_draw() {
        let compiled = Distribution::Normal { mean: 0.0, std_dev: 1.0 }.compile().unwrap();
        let mut a = SimRng::from_seed(9);
        let mut b = SimRng::from_seed(9);
        let mut buffer = vec![0.0; 16];
        compiled.fill(&mut a, &mut buffer);
        for value in buffer {
            assert_eq!(value, compiled.draw(&mut b));
        }
    }
}
