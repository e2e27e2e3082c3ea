//! Configuration loading and typed config structures for the Flowsync engine.
//!
//! The canonical configuration lives in `flowsync-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads and validates the file.

use std::path::Path;

use flowsync_ledger::CoherencyPolicy;
use serde::Deserialize;

/// Environment variable that overrides `logging.level`.
pub const LOG_LEVEL_ENV: &str = "FLOWSYNC_LOG";

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

    /// A value parsed but is outside its allowed range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What was wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `flowsync-config.yaml`. Every field has a
/// default, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// World-level settings (name, seed, fleet size).
    #[serde(default)]
    pub world: WorldConfig,

    /// Tick length, time acceleration, and run bounds.
    #[serde(default)]
    pub time: TimeConfig,

    /// Flow mode and coherency guard.
    #[serde(default)]
    pub flow: FlowConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `FLOWSYNC_LOG` overrides `logging.level` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config
            .logging
            .apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.time.tick_seconds.is_finite() && self.time.tick_seconds > 0.0) {
            return Err(invalid(format!(
                "time.tick_seconds must be positive, got {}",
                self.time.tick_seconds
            )));
        }
        if !(self.time.acceleration.is_finite() && self.time.acceleration >= 1.0) {
            return Err(invalid(format!(
                "time.acceleration must be at least 1, got {}",
                self.time.acceleration
            )));
        }
        if !(self.flow.throttled_acceleration.is_finite() && self.flow.throttled_acceleration >= 1.0) {
            return Err(invalid(format!(
                "flow.throttled_acceleration must be at least 1, got {}",
                self.flow.throttled_acceleration
            )));
        }
        if self.flow.coherency_acceleration_threshold.is_nan() {
            return Err(invalid("flow.coherency_acceleration_threshold is NaN".to_owned()));
        }
        Ok(())
    }
}

const fn invalid(reason: String) -> ConfigError {
    ConfigError::Invalid { reason }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable simulation name.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Random seed for the demo fleet.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of vessels in the demo fleet.
    #[serde(default = "default_vessels")]
    pub vessels: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            seed: default_seed(),
            vessels: default_vessels(),
        }
    }
}

/// Time configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimeConfig {
    /// Simulated seconds per tick at 1x acceleration.
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: f64,

    /// Initial time acceleration multiplier.
    #[serde(default = "default_acceleration")]
    pub acceleration: f64,

    /// Ticks flagged as blended after an acceleration change.
    #[serde(default = "default_blending_ticks")]
    pub blending_ticks: u32,

    /// Stop after this many ticks (0 runs until interrupted).
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            tick_seconds: default_tick_seconds(),
            acceleration: default_acceleration(),
            blending_ticks: default_blending_ticks(),
            max_ticks: default_max_ticks(),
        }
    }
}

/// Flow mode and coherency guard configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FlowConfig {
    /// Respect container priorities; when off every container is tier 1.
    #[serde(default = "default_true")]
    pub priority_flow: bool,

    /// Throttle time acceleration when an external writer adds resources.
    #[serde(default = "default_true")]
    pub coherency_enforced: bool,

    /// Acceleration above which the coherency guard is armed.
    #[serde(default = "default_coherency_threshold")]
    pub coherency_acceleration_threshold: f64,

    /// Acceleration cap applied when the guard fires.
    #[serde(default = "default_throttled_acceleration")]
    pub throttled_acceleration: f64,
}

impl FlowConfig {
    /// The guard settings passed to every ledger sync.
    pub const fn coherency_policy(&self) -> CoherencyPolicy {
        CoherencyPolicy {
            enforced: self.coherency_enforced,
            acceleration_threshold: self.coherency_acceleration_threshold,
            throttled_acceleration: self.throttled_acceleration,
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            priority_flow: true,
            coherency_enforced: true,
            coherency_acceleration_threshold: default_coherency_threshold(),
            throttled_acceleration: default_throttled_acceleration(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl LoggingConfig {
    /// Apply environment overrides through `lookup`.
    ///
    /// `FLOWSYNC_LOG` overrides `level`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup(LOG_LEVEL_ENV).filter(|l| !l.trim().is_empty()) {
            self.level = level;
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_world_name() -> String {
    "Flowsync Demo".to_owned()
}

const fn default_seed() -> u64 {
    42
}

const fn default_vessels() -> u32 {
    3
}

const fn default_tick_seconds() -> f64 {
    0.02
}

const fn default_acceleration() -> f64 {
    1.0
}

const fn default_blending_ticks() -> u32 {
    3
}

const fn default_max_ticks() -> u64 {
    500
}

const fn default_coherency_threshold() -> f64 {
    1000.0
}

const fn default_throttled_acceleration() -> f64 {
    100.0
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert_eq!(config.world.seed, 42);
        assert_eq!(config.world.vessels, 3);
        assert!(config.flow.priority_flow);
        assert!(config.flow.coherency_enforced);
        assert!(config.validate().is_ok());

        let policy = config.flow.coherency_policy();
        assert_eq!(policy, CoherencyPolicy::default());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
world:
  name: "Test Fleet"
  seed: 123
  vessels: 8

time:
  tick_seconds: 0.5
  acceleration: 10000
  blending_ticks: 5
  max_ticks: 20

flow:
  priority_flow: false
  coherency_enforced: false
  coherency_acceleration_threshold: 500
  throttled_acceleration: 50

logging:
  level: "debug"
"#;

        let config = SimulationConfig::parse(yaml).unwrap();

        assert_eq!(config.world.name, "Test Fleet");
        assert_eq!(config.world.vessels, 8);
        assert!((config.time.tick_seconds - 0.5).abs() < f64::EPSILON);
        assert!((config.time.acceleration - 10_000.0).abs() < f64::EPSILON);
        assert_eq!(config.time.blending_ticks, 5);
        assert_eq!(config.time.max_ticks, 20);
        assert!(!config.flow.priority_flow);
        assert!(!config.flow.coherency_enforced);
        assert!((config.flow.throttled_acceleration - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "world:\n  seed: 7\n";
        let config = SimulationConfig::parse(yaml).unwrap();

        // Seed is overridden
        assert_eq!(config.world.seed, 7);
        // Everything else uses defaults
        assert_eq!(config.time.max_ticks, 500);
        assert!((config.flow.coherency_acceleration_threshold - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_empty_yaml() {
        let yaml = "";
        let config = SimulationConfig::parse(yaml);
        assert!(config.is_ok());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for yaml in [
            "time:\n  tick_seconds: 0\n",
            "time:\n  tick_seconds: -1\n",
            "time:\n  acceleration: 0.5\n",
            "flow:\n  throttled_acceleration: 0\n",
        ] {
            let config = SimulationConfig::parse(yaml);
            assert!(
                matches!(config, Err(ConfigError::Invalid { .. })),
                "{yaml} should be rejected, got {config:?}"
            );
        }
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        let config = SimulationConfig::parse("time: [1, 2");
        assert!(matches!(config, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn log_level_override() {
        let mut logging = LoggingConfig::default();
        logging.apply_overrides(|_| None);
        assert_eq!(logging.level, "info");

        logging.apply_overrides(|key| (key == LOG_LEVEL_ENV).then(|| "trace".to_owned()));
        assert_eq!(logging.level, "trace");

        logging.apply_overrides(|_| Some("  ".to_owned()));
        assert_eq!(logging.level, "trace");
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("flowsync-config.yaml");
        if path.exists() {
            let config = SimulationConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
