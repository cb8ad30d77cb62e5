//! Analysis configuration.
//!
//! [`NpaConfig`] can be built in code, parsed from JSON, or read from the
//! environment:
//!
//! - `NPA_MEASUREMENT_KEY`: data key of node measurements (required)
//! - `NPA_TAG`: data key of prior scores (default: "score")
//! - `NPA_DEFAULT_SCORE`: score of unmeasured nodes (default: 0)
//! - `NPA_RUNS`: Monte Carlo runs per target (default: 1000)
//! - `NPA_SEED`: base RNG seed (default: random, logged)
//! - `NPA_THREADS`: worker threads (default: available cores)
//! - `NPA_PRUNE_UNMEASURED`: prune unmeasured upstream nodes (default: false)
//! - `NPA_MAX_DURATION_MS`: wall-clock budget per batch of runs (default: none)

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::runner::{RunnerConfig, DEFAULT_TAG};

/// Default number of Monte Carlo runs per target.
pub const DEFAULT_RUNS: usize = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {name} is not set")]
    MissingVar { name: &'static str },

    #[error("invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },

    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
}

fn default_tag() -> String {
    DEFAULT_TAG.to_string()
}

fn default_runs() -> usize {
    DEFAULT_RUNS
}

/// Everything needed to score one or more targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpaConfig {
    /// Data key holding node measurements.
    pub measurement_key: String,
    /// Data key holding prior scores.
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default)]
    pub default_score: f64,
    #[serde(default = "default_runs")]
    pub runs: usize,
    /// Base seed. When absent, one is drawn from entropy and logged so the
    /// batch can be reproduced.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Worker threads. When absent, rayon picks the number of cores.
    #[serde(default)]
    pub threads: Option<usize>,
    /// Prune unmeasured upstream nodes from each mechanism before scoring.
    #[serde(default)]
    pub prune_unmeasured: bool,
    #[serde(default)]
    pub max_duration_ms: Option<u64>,
}

impl NpaConfig {
    pub fn new(measurement_key: impl Into<String>) -> Self {
        NpaConfig {
            measurement_key: measurement_key.into(),
            tag: default_tag(),
            default_score: 0.0,
            runs: DEFAULT_RUNS,
            seed: None,
            threads: None,
            prune_unmeasured: false,
            max_duration_ms: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_default_score(mut self, default_score: f64) -> Self {
        self.default_score = default_score;
        self
    }

    pub fn with_runs(mut self, runs: usize) -> Self {
        self.runs = runs;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_pruning(mut self, prune_unmeasured: bool) -> Self {
        self.prune_unmeasured = prune_unmeasured;
        self
    }

    pub fn with_max_duration(mut self, budget: Duration) -> Self {
        self.max_duration_ms = Some(u64::try_from(budget.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// The wall-clock budget of one batch of runs, if any.
    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_ms.map(Duration::from_millis)
    }

    /// Key used to prune mechanisms, when pruning is enabled.
    pub fn prune_key(&self) -> Option<&str> {
        self.prune_unmeasured.then_some(self.measurement_key.as_str())
    }

    /// The per-run subset of this config.
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            tag: self.tag.clone(),
            measurement_key: self.measurement_key.clone(),
            default_score: self.default_score,
        }
    }

    /// Rejects configurations no analysis can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::Invalid {
                reason: reason.to_string(),
            })
        };

        if self.measurement_key.is_empty() {
            return invalid("measurement key must not be empty");
        }
        if self.tag.is_empty() {
            return invalid("tag must not be empty");
        }
        if self.runs == 0 {
            return invalid("runs must be at least 1");
        }
        if self.threads == Some(0) {
            return invalid("threads must be at least 1");
        }
        if !self.default_score.is_finite() {
            return invalid("default score must be finite");
        }
        Ok(())
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: NpaConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates the configuration from `NPA_*` environment
    /// variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let measurement_key = lookup("NPA_MEASUREMENT_KEY").ok_or(ConfigError::MissingVar {
            name: "NPA_MEASUREMENT_KEY",
        })?;
        let mut config = NpaConfig::new(measurement_key);

        if let Some(tag) = lookup("NPA_TAG") {
            config.tag = tag;
        }
        if let Some(value) = parse_var(&lookup, "NPA_DEFAULT_SCORE")? {
            config.default_score = value;
        }
        if let Some(value) = parse_var(&lookup, "NPA_RUNS")? {
            config.runs = value;
        }
        config.seed = parse_var(&lookup, "NPA_SEED")?;
        config.threads = parse_var(&lookup, "NPA_THREADS")?;
        config.max_duration_ms = parse_var(&lookup, "NPA_MAX_DURATION_MS")?;
        if let Some(value) = lookup("NPA_PRUNE_UNMEASURED") {
            config.prune_unmeasured = parse_flag(&value).ok_or(ConfigError::InvalidValue {
                name: "NPA_PRUNE_UNMEASURED",
                value,
            })?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => match value.trim().parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(ConfigError::InvalidValue { name, value }),
        },
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
