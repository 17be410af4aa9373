//! Per-batch sampling of a compiled scenario.
//!
//! Rows are drawn one iteration at a time, variables in scenario order, so
//! the stream of random numbers a batch consumes does not depend on the
//! checkpoint interval. Independent Gaussian scenarios draw each marginal
//! directly; everything else goes through the copula and each variable's
//! quantile function.

use crate::batch::BatchSpec;
use crate::control::{Interrupt, RunControl};
use crate::result::CorrelationDiagnostics;
use sim_core::correlation::{Copula, CorrelationModel, PsdPolicy};
use sim_core::distributions::{CompiledDistribution, Distribution};
use sim_core::rng::SimRng;
use sim_core::types::{CorrelationError, SampleMatrix};
use sim_scenarios::{Scenario, Variable};

/// Why a batch produced no samples.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum BatchFailure {
    /// Stopped at a checkpoint.
    Interrupted(Interrupt),
    /// Produced an unusable value.
    Failed {
        /// Offending variable or outcome
        variable: String,
        /// What went wrong
        message: String,
    },
}

impl BatchFailure {
    fn failed(variable: &str, message: impl Into<String>) -> Self {
        Self::Failed {
            variable: variable.to_string(),
            message: message.into(),
        }
    }

    fn non_finite(variable: &str, value: f64, iteration: usize) -> Self {
        Self::failed(
            variable,
            format!("non-finite value {} at iteration {}", value, iteration),
        )
    }
}

struct VariableKernel {
    variable: Variable,
    base: CompiledDistribution,
}

/// Monotone map taking a draw (or quantile) of a base distribution to the
/// same-probability point of a drifted distribution of the same family.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Remap {
    /// `scale * x + shift`
    Affine { scale: f64, shift: f64 },
    /// `exp(scale * ln x + shift)`
    LogAffine { scale: f64, shift: f64 },
}

impl Remap {
    const IDENTITY: Remap = Remap::Affine { scale: 1.0, shift: 0.0 };

    /// Map from `base` to `drifted`, when the two differ only by location
    /// and scale. Shape changes need their own compiled kernel.
    fn between(base: &Distribution, drifted: &Distribution) -> Option<Self> {
        let affine = |from_low: f64, from_width: f64, to_low: f64, to_width: f64| {
            let scale = to_width / from_width;
            (scale, to_low - from_low * scale)
        };
        let remap = match (*base, *drifted) {
            (Distribution::Normal { mean: m0, std_dev: s0 }, Distribution::Normal { mean: m1, std_dev: s1 }) => {
                let (scale, shift) = affine(m0, s0, m1, s1);
                Remap::Affine { scale, shift }
            }
            (Distribution::LogNormal { mu: m0, sigma: s0 }, Distribution::LogNormal { mu: m1, sigma: s1 }) => {
                let (scale, shift) = affine(m0, s0, m1, s1);
                Remap::LogAffine { scale, shift }
            }
            (Distribution::Uniform { low: l0, high: h0 }, Distribution::Uniform { low: l1, high: h1 }) => {
                let (scale, shift) = affine(l0, h0 - l0, l1, h1 - l1);
                Remap::Affine { scale, shift }
            }
            (Distribution::Exponential { rate: r0 }, Distribution::Exponential { rate: r1 }) => Remap::Affine {
                scale: r0 / r1,
                shift: 0.0,
            },
            (Distribution::Gamma { shape: k0, scale: s0 }, Distribution::Gamma { shape: k1, scale: s1 })
            | (Distribution::Weibull { shape: k0, scale: s0 }, Distribution::Weibull { shape: k1, scale: s1 })
                if k0 == k1 =>
            {
                Remap::Affine {
                    scale: s1 / s0,
                    shift: 0.0,
                }
            }
            (
                Distribution::Triangular { min: a0, mode: c0, max: b0 },
                Distribution::Triangular { min: a1, mode: c1, max: b1 },
            ) => {
                let (w0, w1) = (b0 - a0, b1 - a1);
                let skew = ((c0 - a0) / w0 - (c1 - a1) / w1).abs();
                if skew > 1e-12 {
                    return None;
                }
                let (scale, shift) = affine(a0, w0, a1, w1);
                Remap::Affine { scale, shift }
            }
            _ => return None,
        };
        let finite = match remap {
            Remap::Affine { scale, shift } | Remap::LogAffine { scale, shift } => {
                scale.is_finite() && scale > 0.0 && shift.is_finite()
            }
        };
        finite.then_some(remap)
    }

    #[inline]
    fn apply(self, x: f64) -> f64 {
        match self {
            Remap::Affine { scale, shift } => scale * x + shift,
            Remap::LogAffine { scale, shift } => (scale * x.ln() + shift).exp(),
        }
    }
}

/// Cached drift state of one variable.
enum Drifted {
    /// Base kernel plus a remap
    Remapped(Remap),
    /// Kernel compiled for one step
    Compiled(usize, CompiledDistribution),
}

struct CompiledOutcome {
    name: String,
    intercept: f64,
    terms: Vec<(usize, f64)>,
}

impl CompiledOutcome {
    #[inline]
    fn evaluate(&self, row: &[f64]) -> f64 {
        self.terms
            .iter()
            .fold(self.intercept, |acc, &(index, weight)| acc + weight * row[index])
    }
}

/// A scenario compiled for one run.
pub(crate) struct ScenarioSampler {
    columns: Vec<String>,
    variables: Vec<VariableKernel>,
    outcomes: Vec<CompiledOutcome>,
    model: Option<CorrelationModel>,
    diagnostics: CorrelationDiagnostics,
    total_iterations: usize,
    checkpoint_interval: usize,
}

impl ScenarioSampler {
    /// Compiles distributions, outcomes and the correlation model.
    ///
    /// # Errors
    ///
    /// `CorrelationError::Validation` for rejected matrices or parameters,
    /// `CorrelationError::Numerical` when factorisation fails.
    pub(crate) fn compile(
        scenario: &Scenario,
        default_copula: Copula,
        psd_policy: PsdPolicy,
        eigenvalue_floor: f64,
        total_iterations: usize,
        checkpoint_interval: usize,
    ) -> Result<Self, CorrelationError> {
        let variables = scenario
            .variables()
            .iter()
            .map(|v| {
                Ok(VariableKernel {
                    variable: v.clone(),
                    base: CompiledDistribution::new(*v.distribution())?,
                })
            })
            .collect::<Result<Vec<_>, CorrelationError>>()?;

        let names = scenario.variable_names();
        let outcomes = scenario
            .outcomes()
            .iter()
            .map(|o| CompiledOutcome {
                name: o.name.clone(),
                intercept: o.intercept,
                terms: o
                    .weights
                    .iter()
                    .filter_map(|(name, &w)| names.iter().position(|n| n == name).map(|i| (i, w)))
                    .collect(),
            })
            .collect();

        let copula = scenario.copula().unwrap_or(default_copula);
        let model = if scenario.correlation().is_independent() && copula == Copula::Gaussian {
            None
        } else {
            let matrix = scenario.resolve_correlation()?;
            let model = CorrelationModel::build(matrix, copula, psd_policy, eigenvalue_floor)?;
            Some(model)
        };
        let diagnostics = match &model {
            Some(m) => CorrelationDiagnostics {
                copula: m.copula(),
                independent: m.is_independent(),
                projected: m.is_projected(),
                diagnostic: m.diagnostic().copied(),
            },
            None => CorrelationDiagnostics {
                copula,
                independent: true,
                projected: false,
                diagnostic: None,
            },
        };
        // an identity Gaussian model samples faster from the marginals
        let model = model.filter(|m| !m.is_independent());

        Ok(Self {
            columns: scenario.column_names(),
            variables,
            outcomes,
            model,
            diagnostics,
            total_iterations,
            checkpoint_interval: checkpoint_interval.max(1),
        })
    }

    /// Correlation handling applied to this run.
    pub(crate) fn diagnostics(&self) -> &CorrelationDiagnostics {
        &self.diagnostics
    }

    /// Number of output columns.
    pub(crate) fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Output column names, variables then outcomes.
    pub(crate) fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Draws one batch.
    pub(crate) fn sample_batch(
        &self,
        batch: &BatchSpec,
        control: &RunControl,
    ) -> Result<SampleMatrix, BatchFailure> {
        let mut rng = SimRng::from_seed(batch.seed);
        let n_vars = self.variables.len();
        let mut columns: Vec<Vec<f64>> = (0..self.columns.len())
            .map(|_| Vec::with_capacity(batch.len))
            .collect();
        let mut row = vec![0.0; n_vars];
        let mut scratch = vec![0.0; n_vars];
        let mut uniforms = vec![0.0; n_vars];
        let mut drifted: Vec<Option<Drifted>> = (0..n_vars).map(|_| None).collect();

        for (offset, iteration) in batch.range().enumerate() {
            if offset > 0 && offset % self.checkpoint_interval == 0 {
                if let Some(interrupt) = control.check() {
                    return Err(BatchFailure::Interrupted(interrupt));
                }
            }
            if let Some(model) = &self.model {
                model.sample_uniforms(&mut rng, &mut scratch, &mut uniforms);
            }
            for j in 0..n_vars {
                let (kernel, remap) = self.kernel_at(j, iteration, &mut drifted)?;
                let x = remap.apply(match &self.model {
                    Some(_) => kernel.quantile(uniforms[j]),
                    None => kernel.draw(&mut rng),
                });
                if !x.is_finite() {
                    return Err(BatchFailure::non_finite(self.variables[j].variable.name(), x, iteration));
                }
                row[j] = x;
                columns[j].push(x);
            }
            for (k, outcome) in self.outcomes.iter().enumerate() {
                let y = outcome.evaluate(&row);
                if !y.is_finite() {
                    return Err(BatchFailure::non_finite(&outcome.name, y, iteration));
                }
                columns[n_vars + k].push(y);
            }
        }

        SampleMatrix::from_columns(self.columns.clone(), columns)
            .map_err(|e| BatchFailure::failed("samples", e.to_string()))
    }

    /// Kernel and remap giving variable `j` at `iteration`.
    ///
    /// Location and scale drift reuses the base kernel through a remap;
    /// other drift compiles a kernel once per step.
    fn kernel_at<'a>(
        &'a self,
        j: usize,
        iteration: usize,
        drifted: &'a mut [Option<Drifted>],
    ) -> Result<(&'a CompiledDistribution, Remap), BatchFailure> {
        let kernel = &self.variables[j];
        let Some(drift) = kernel.variable.drift() else {
            return Ok((&kernel.base, Remap::IDENTITY));
        };
        let step = drift.step_at(iteration, self.total_iterations);
        let current = matches!(&drifted[j], Some(Drifted::Compiled(s, _)) if *s == step);
        if !current {
            let name = kernel.variable.name();
            let spec = kernel
                .variable
                .distribution_at(iteration, self.total_iterations)
                .map_err(|e| BatchFailure::failed(name, e.to_string()))?;
            drifted[j] = Some(match Remap::between(kernel.base.spec(), &spec) {
                Some(remap) => Drifted::Remapped(remap),
                None => Drifted::Compiled(
                    step,
                    CompiledDistribution::new(spec).map_err(|e| BatchFailure::failed(name, e.to_string()))?,
                ),
            });
        }
        Ok(match &drifted[j] {
            Some(Drifted::Compiled(_, compiled)) => (compiled, Remap::IDENTITY),
            Some(Drifted::Remapped(remap)) => (&kernel.base, *remap),
            None => (&kernel.base, Remap::IDENTITY),
        })
    }
}
