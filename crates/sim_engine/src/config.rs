//! Engine configuration.
//!
//! Settings come from three layers, lowest precedence first:
//! 1. [`EngineConfig::default`]
//! 2. a TOML file ([`EngineConfig::from_file`])
//! 3. `SIM_*` environment variables ([`EngineConfig::with_env_override`])
//!
//! followed by [`EngineConfig::validate`], which reports every problem at
//! once.
//!
//! ```toml
//! max_concurrent_runs = 2
//! batch_size = 500
//! psd_policy = "strict"
//! interrupt_policy = "fail"
//! copula = { type = "student_t", degrees_of_freedom = 5.0 }
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use sim_core::correlation::{Copula, PsdPolicy, DEFAULT_EIGENVALUE_FLOOR};
use sim_risk::DEFAULT_VAR_CONFIDENCE;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "SIM_";

/// What an interrupted (cancelled or timed-out) run returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptPolicy {
    /// Analyse the completed batches and flag partial completion.
    #[default]
    ReturnPartial,
    /// Discard everything and report the interruption.
    Fail,
}

/// What a batch failure (non-finite sample, bad drifted distribution) does
/// to the run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchFailurePolicy {
    /// Fail the run with a computation error naming batch and variable.
    #[default]
    Abort,
    /// Drop failed batches and flag partial completion.
    SkipFailed,
}

/// Engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Runs executing at once; further runs queue
    pub max_concurrent_runs: usize,
    /// Worker threads when a run gives no parallelism hint
    pub default_parallelism: usize,
    /// Most worker threads any one run may use
    pub max_parallelism: usize,
    /// Iterations per batch (fixed, so results do not depend on workers)
    pub batch_size: usize,
    /// Iterations between cancellation checks inside a batch
    pub checkpoint_interval: usize,
    /// Largest accepted iteration count
    pub max_iterations: usize,
    /// Largest sample matrix, in bytes
    pub max_sample_bytes: usize,
    /// Cached results kept
    pub cache_capacity: u64,
    /// Cached result lifetime, in seconds
    pub cache_ttl_secs: u64,
    /// Handling of non-PSD correlation matrices
    pub psd_policy: PsdPolicy,
    /// Eigenvalue floor used by PSD projection
    pub eigenvalue_floor: f64,
    /// Copula for scenarios that do not choose one
    pub copula: Copula,
    /// Cancellation and timeout behaviour
    pub interrupt_policy: InterruptPolicy,
    /// Batch failure behaviour
    pub batch_failure_policy: BatchFailurePolicy,
    /// Keep the raw sample matrix in results
    pub retain_samples: bool,
    /// VaR/CVaR confidence
    pub var_confidence: f64,
    /// Extra domain profiles loaded at engine construction
    pub profiles_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 4,
            default_parallelism: num_cpus::get().max(1),
            max_parallelism: 4 * num_cpus::get().max(1),
            batch_size: 1_000,
            checkpoint_interval: 256,
            max_iterations: 10_000_000,
            max_sample_bytes: 1 << 30,
            cache_capacity: 128,
            cache_ttl_secs: 3_600,
            psd_policy: PsdPolicy::Project,
            eigenvalue_floor: DEFAULT_EIGENVALUE_FLOOR,
            copula: Copula::Gaussian,
            interrupt_policy: InterruptPolicy::ReturnPartial,
            batch_failure_policy: BatchFailurePolicy::Abort,
            retain_samples: true,
            var_confidence: DEFAULT_VAR_CONFIDENCE,
            profiles_path: None,
        }
    }
}

impl EngineConfig {
    /// Loads a configuration file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Loads, applies environment overrides and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_env_override()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `SIM_*` environment variables.
    pub fn with_env_override(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from any key lookup (keys carry the `SIM_` prefix).
    ///
    /// # Errors
    ///
    /// `ConfigError::Parse` listing the first value that does not parse.
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        override_parsed(&get, "MAX_CONCURRENT_RUNS", &mut self.max_concurrent_runs)?;
        override_parsed(&get, "DEFAULT_PARALLELISM", &mut self.default_parallelism)?;
        override_parsed(&get, "MAX_PARALLELISM", &mut self.max_parallelism)?;
        override_parsed(&get, "BATCH_SIZE", &mut self.batch_size)?;
        override_parsed(&get, "CHECKPOINT_INTERVAL", &mut self.checkpoint_interval)?;
        override_parsed(&get, "MAX_ITERATIONS", &mut self.max_iterations)?;
        override_parsed(&get, "MAX_SAMPLE_BYTES", &mut self.max_sample_bytes)?;
        override_parsed(&get, "CACHE_CAPACITY", &mut self.cache_capacity)?;
        override_parsed(&get, "CACHE_TTL_SECS", &mut self.cache_ttl_secs)?;
        override_parsed(&get, "EIGENVALUE_FLOOR", &mut self.eigenvalue_floor)?;
        override_parsed(&get, "RETAIN_SAMPLES", &mut self.retain_samples)?;
        override_parsed(&get, "VAR_CONFIDENCE", &mut self.var_confidence)?;

        if let Some(value) = get("PSD_POLICY") {
            self.psd_policy = match value.to_lowercase().as_str() {
                "project" => PsdPolicy::Project,
                "strict" => PsdPolicy::Strict,
                other => return Err(invalid("PSD_POLICY", other)),
            };
        }
        if let Some(value) = get("INTERRUPT_POLICY") {
            self.interrupt_policy = match value.to_lowercase().as_str() {
                "return_partial" => InterruptPolicy::ReturnPartial,
                "fail" => InterruptPolicy::Fail,
                other => return Err(invalid("INTERRUPT_POLICY", other)),
            };
        }
        if let Some(value) = get("BATCH_FAILURE_POLICY") {
            self.batch_failure_policy = match value.to_lowercase().as_str() {
                "abort" => BatchFailurePolicy::Abort,
                "skip_failed" => BatchFailurePolicy::SkipFailed,
                other => return Err(invalid("BATCH_FAILURE_POLICY", other)),
            };
        }
        if let Some(value) = get("PROFILES_PATH") {
            self.profiles_path = Some(PathBuf::from(value));
        }
        Ok(self)
    }

    /// Checks every setting, collecting all problems.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.max_concurrent_runs == 0 {
            errors.push("max_concurrent_runs must be greater than 0".to_string());
        }
        if self.default_parallelism == 0 {
            errors.push("default_parallelism must be greater than 0".to_string());
        }
        if self.max_parallelism == 0 {
            errors.push("max_parallelism must be greater than 0".to_string());
        } else if self.default_parallelism > self.max_parallelism {
            errors.push(format!(
                "default_parallelism {} exceeds max_parallelism {}",
                self.default_parallelism, self.max_parallelism
            ));
        }
        if self.batch_size == 0 {
            errors.push("batch_size must be greater than 0".to_string());
        }
        if self.checkpoint_interval == 0 {
            errors.push("checkpoint_interval must be greater than 0".to_string());
        }
        if self.max_iterations == 0 {
            errors.push("max_iterations must be greater than 0".to_string());
        }
        if self.max_sample_bytes == 0 {
            errors.push("max_sample_bytes must be greater than 0".to_string());
        }
        if !(self.eigenvalue_floor.is_finite() && self.eigenvalue_floor > 0.0) {
            errors.push(format!(
                "eigenvalue_floor must be a positive number, got {}",
                self.eigenvalue_floor
            ));
        }
        if !(self.var_confidence > 0.0 && self.var_confidence < 1.0) {
            errors.push(format!(
                "var_confidence must lie in (0, 1), got {}",
                self.var_confidence
            ));
        }
        if let Err(e) = self.copula.validate() {
            errors.push(format!("copula: {}", e));
        }
        if let Some(path) = &self.profiles_path {
            if !path.exists() {
                errors.push(format!("profiles_path '{}' does not exist", path.display()));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Cache entry lifetime.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Sets the concurrent run limit.
    pub fn with_max_concurrent_runs(mut self, runs: usize) -> Self {
        self.max_concurrent_runs = runs;
        self
    }

    /// Sets the default worker count.
    pub fn with_default_parallelism(mut self, workers: usize) -> Self {
        self.default_parallelism = workers;
        self
    }

    /// Sets the per-run worker limit.
    pub fn with_max_parallelism(mut self, workers: usize) -> Self {
        self.max_parallelism = workers;
        self
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the checkpoint interval.
    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    /// Sets the iteration limit.
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Sets the sample memory limit.
    pub fn with_max_sample_bytes(mut self, bytes: usize) -> Self {
        self.max_sample_bytes = bytes;
        self
    }

    /// Sets cache capacity and lifetime.
    pub fn with_cache(mut self, capacity: u64, ttl_secs: u64) -> Self {
        self.cache_capacity = capacity;
        self.cache_ttl_secs = ttl_secs;
        self
    }

    /// Sets the PSD policy.
    pub fn with_psd_policy(mut self, policy: PsdPolicy) -> Self {
        self.psd_policy = policy;
        self
    }

    /// Sets the default copula.
    pub fn with_copula(mut self, copula: Copula) -> Self {
        self.copula = copula;
        self
    }

    /// Sets the interrupt policy.
    pub fn with_interrupt_policy(mut self, policy: InterruptPolicy) -> Self {
        self.interrupt_policy = policy;
        self
    }

    /// Sets the batch failure policy.
    pub fn with_batch_failure_policy(mut self, policy: BatchFailurePolicy) -> Self {
        self.batch_failure_policy = policy;
        self
    }

    /// Keeps or drops raw samples in results.
    pub fn with_retain_samples(mut self, retain: bool) -> Self {
        self.retain_samples = retain;
        self
    }

    /// Sets the VaR confidence.
    pub fn with_var_confidence(mut self, confidence: f64) -> Self {
        self.var_confidence = confidence;
        self
    }

    /// Sets the extra profile file.
    pub fn with_profiles_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.profiles_path = Some(path.into());
        self
    }
}

fn override_parsed<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &str,
    target: &mut T,
) -> Result<(), ConfigError> {
    if let Some(value) = get(name) {
        *target = value.trim().parse().map_err(|_| invalid(name, &value))?;
    }
    Ok(())
}

fn invalid(name: &str, value: &str) -> ConfigError {
    ConfigError::Parse(format!("invalid value '{}' for {}{}", value, ENV_PREFIX, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.interrupt_policy, InterruptPolicy::ReturnPartial);
        assert_eq!(config.batch_failure_policy, BatchFailurePolicy::Abort);
        assert_eq!(config.psd_policy, PsdPolicy::Project);
        assert!(config.default_parallelism >= 1);
        assert!(config.max_parallelism >= config.default_parallelism);
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
batch_size = 250
psd_policy = "strict"
interrupt_policy = "fail"
copula = {{ type = "student_t", degrees_of_freedom = 4.0 }}
"#
        )
        .unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.psd_policy, PsdPolicy::Strict);
        assert_eq!(config.interrupt_policy, InterruptPolicy::Fail);
        assert_eq!(config.copula, Copula::StudentT { degrees_of_freedom: 4.0 });
        assert_eq!(config.max_concurrent_runs, 4);
    }

    #[test]
    fn test_from_file_errors() {
        assert!(matches!(
            EngineConfig::from_file("/nonexistent/engine.toml"),
            Err(ConfigError::Io(_))
        ));
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "batch_size = \"many\"").unwrap();
        assert!(matches!(EngineConfig::from_file(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SIM_BATCH_SIZE", "64"),
            ("SIM_PSD_POLICY", "STRICT"),
            ("SIM_BATCH_FAILURE_POLICY", "skip_failed"),
            ("SIM_RETAIN_SAMPLES", "false"),
            ("SIM_VAR_CONFIDENCE", "0.99"),
        ]
        .into();
        let config = EngineConfig::default()
            .with_overrides_from(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.psd_policy, PsdPolicy::Strict);
        assert_eq!(config.batch_failure_policy, BatchFailurePolicy::SkipFailed);
        assert!(!config.retain_samples);
        assert_eq!(config.var_confidence, 0.99);
    }

    #[test]
    fn test_bad_override() {
        let err = EngineConfig::default()
            .with_overrides_from(|k| (k == "SIM_BATCH_SIZE").then(|| "lots".to_string()))
            .unwrap_err();
        assert_eq!(err.to_string(), "Parse error: invalid value 'lots' for SIM_BATCH_SIZE");
    }

    #[test]
    fn test_parallelism_limits() {
        let vars: HashMap<&str, &str> = [("SIM_MAX_PARALLELISM", "6"), ("SIM_DEFAULT_PARALLELISM", "2")].into();
        let config = EngineConfig::default()
            .with_overrides_from(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.max_parallelism, 6);
        assert!(config.validate().is_ok());

        let zero = EngineConfig::default().with_max_parallelism(0);
        assert!(matches!(zero.validate(), Err(ConfigError::Validation(e)) if e.len() == 1));

        let inverted = EngineConfig::default()
            .with_default_parallelism(8)
            .with_max_parallelism(4);
        match inverted.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors, vec!["default_parallelism 8 exceeds max_parallelism 4".to_string()])
            }
            other => panic!("expected validation errors, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let config = EngineConfig::default()
            .with_batch_size(0)
            .with_max_concurrent_runs(0)
            .with_var_confidence(1.5)
            .with_copula(Copula::StudentT { degrees_of_freedom: -1.0 });
        match config.validate() {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 4),
            other => panic!("expected validation errors, got {:?}", other),
        }
    }
}
