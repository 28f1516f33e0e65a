//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure that can end a run before the tick
//! loop returns a result.

use std::path::PathBuf;

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: holescan_core::ConfigError,
    },

    /// The target file could not be read.
    #[error("cannot read targets from {}: {source}", path.display())]
    TargetsIo {
        /// The target file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The target file is not a JSON array of target records.
    #[error("cannot parse targets from {}: {source}", path.display())]
    TargetsFormat {
        /// The target file.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// Partitioning, planning, or batch setup failed.
    #[error("workflow error: {source}")]
    Workflow {
        /// The underlying workflow error.
        #[from]
        source: holescan_core::WorkflowError,
    },

    /// The tick loop failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: holescan_core::RunnerError,
    },
}
