//! Configuration loading and typed config structures.
//!
//! The configuration lives in `holescan-config.yaml`. Every section and
//! field is optional; missing values fall back to the defaults below.
//!
//! ```yaml
//! simulation:
//!   tick_interval_ms: 100
//!   unit_dwell_ms: 10000
//!   reveal_offset_ms: 9500
//!   qualified_rate: 0.995
//!   defective_rate: 0.005
//!   blind_rate: 0.0
//!   seed: 0
//! geometry:
//!   axis_orientation: math_y_up
//! storage:
//!   root_dir: data/batches
//! recovery:
//!   mode: lenient
//! runner:
//!   pacing: wall_clock
//! input:
//!   targets_path: targets.json
//!   product_id: CAP1000
//!   is_mock: true
//! logging:
//!   level: info
//! ```

use std::path::{Path, PathBuf};

use holescan_geometry::AxisOrientation;
use holescan_types::{SimulationConfigError, SimulationParams};
use serde::Deserialize;

use crate::lifecycle::RecoveryMode;
use crate::runner::Pacing;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "holescan-config.yaml";

/// Environment variable overriding `storage.root_dir`.
pub const DATA_DIR_ENV: &str = "HOLESCAN_DATA_DIR";

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

    /// The simulation section is inconsistent.
    #[error("invalid simulation settings: {source}")]
    Simulation {
        /// The validation failure.
        #[from]
        source: SimulationConfigError,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InspectionConfig {
    /// Timing and outcome rates.
    #[serde(default)]
    pub simulation: SimulationParams,

    /// Coordinate conventions.
    #[serde(default)]
    pub geometry: GeometryConfig,

    /// Snapshot storage.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Snapshot recovery policy.
    #[serde(default)]
    pub recovery: RecoveryConfig,

    /// Tick loop pacing.
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Batch input.
    #[serde(default)]
    pub input: InputConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl InspectionConfig {
    /// Load configuration from a YAML file, apply environment overrides,
    /// and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, and
    /// [`ConfigError::Simulation`] if the simulation section is invalid.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, apply environment
    /// overrides, and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] or [`ConfigError::Simulation`].
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.storage.apply_env_overrides();
        config.simulation.validate()?;
        Ok(config)
    }
}

/// Coordinate conventions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct GeometryConfig {
    /// Direction of the vertical axis.
    #[serde(default)]
    pub axis_orientation: AxisOrientation,
}

/// Snapshot storage.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one sub-directory per batch.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
}

impl StorageConfig {
    /// Override `root_dir` from `HOLESCAN_DATA_DIR` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(DATA_DIR_ENV) {
            self.root_dir = PathBuf::from(val);
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
        }
    }
}

/// Snapshot recovery policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct RecoveryConfig {
    /// How `resume` handles a missing or invalid snapshot.
    #[serde(default)]
    pub mode: RecoveryMode,
}

/// Tick loop pacing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct RunnerConfig {
    /// Wall-clock pacing between ticks.
    #[serde(default)]
    pub pacing: Pacing,
}

/// Batch input.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InputConfig {
    /// JSON file holding the target records.
    #[serde(default = "default_targets_path")]
    pub targets_path: PathBuf,

    /// Product code the batch inspects.
    #[serde(default = "default_product_id")]
    pub product_id: String,

    /// Whether outcomes are simulated.
    #[serde(default = "default_is_mock")]
    pub is_mock: bool,

    /// Batch to reload from storage and resume instead of starting a new one.
    #[serde(default)]
    pub resume_batch: Option<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            targets_path: default_targets_path(),
            product_id: default_product_id(),
            is_mock: default_is_mock(),
            resume_batch: None,
        }
    }
}

/// Logging.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error), used when `RUST_LOG`
    /// is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("data/batches")
}

fn default_targets_path() -> PathBuf {
    PathBuf::from("targets.json")
}

fn default_product_id() -> String {
    "CAP1000".to_owned()
}

const fn default_is_mock() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_owned()
}
