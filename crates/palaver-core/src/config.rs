//! Configuration loading and typed config structures.
//!
//! The canonical configuration lives in `palaver-config.yaml` at the
//! deployment root. This module defines strongly-typed structs that
//! mirror the YAML structure and provides a loader that reads and
//! validates the file. All fields have defaults, so an empty file (or no
//! file at all) yields a working configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use palaver_agents::NegotiationPolicy;

use crate::runner::RunnerOptions;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but makes no sense.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level cluster configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClusterConfig {
    /// Search bounds for petitioners on this cluster.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Run loop settings.
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// Search bound settings, mirroring the `policy` YAML key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PolicyConfig {
    /// Maximum recursion depth for constraint resolution (default: 10).
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// How many ranked candidates a petitioner tries (default: 5).
    #[serde(default = "default_max_nearest")]
    pub max_nearest: usize,

    /// Maximum cumulative travel distance; absent means unbounded.
    #[serde(default)]
    pub max_travel_distance: Option<f64>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_nearest: default_max_nearest(),
            max_travel_distance: None,
        }
    }
}

/// Run loop settings, mirroring the `runner` YAML key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunnerConfig {
    /// Hard tick bound for a run (default: 1000).
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,

    /// Milliseconds between ticks (default: 10; 0 runs flat out).
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_ticks: default_max_ticks(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

const fn default_max_depth() -> u32 {
    10
}

const fn default_max_nearest() -> usize {
    5
}

const fn default_max_ticks() -> u64 {
    1000
}

const fn default_tick_interval_ms() -> u64 {
    10
}

impl ClusterConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it does not parse, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string does not parse, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(budget) = self.policy.max_travel_distance {
            if !budget.is_finite() || budget < 0.0 {
                return Err(ConfigError::Invalid {
                    reason: "max_travel_distance must be a non-negative finite number".to_owned(),
                });
            }
        }
        Ok(())
    }

    /// The negotiation policy this configuration describes.
    pub fn policy(&self) -> NegotiationPolicy {
        NegotiationPolicy {
            max_depth: self.policy.max_depth,
            max_nearest: self.policy.max_nearest,
            max_travel_distance: self
                .policy
                .max_travel_distance
                .unwrap_or(f64::INFINITY),
        }
    }

    /// The runner options this configuration describes.
    pub const fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            max_ticks: self.runner.max_ticks,
            tick_interval: Duration::from_millis(self.runner.tick_interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = ClusterConfig::from_yaml("{}").ok();
        assert_eq!(config, Some(ClusterConfig::default()));
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let yaml = "policy:\n  max_depth: 3\n  max_travel_distance: 25.0\n";
        let policy = ClusterConfig::from_yaml(yaml).ok().map(|c| c.policy());
        assert_eq!(policy.as_ref().map(|p| p.max_depth), Some(3));
        assert_eq!(policy.as_ref().map(|p| p.max_nearest), Some(5));
        let travel = policy.map(|p| p.max_travel_distance).unwrap_or_default();
        assert!((travel - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn negative_travel_budget_is_rejected() {
        let yaml = "policy:\n  max_travel_distance: -1.0\n";
        assert!(matches!(
            ClusterConfig::from_yaml(yaml),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn absent_travel_budget_means_unbounded() {
        let config = ClusterConfig::default();
        assert!(config.policy().max_travel_distance.is_infinite());
    }
}
