//! Batch orchestration for the hole inspection engine.
//!
//! This crate owns everything that happens once a target list has been
//! partitioned and ordered: the batch state machine, the tick-driven
//! detection driver, simulated outcome sampling, snapshot-based
//! pause/resume, and the async tick loop.
//!
//! # Modules
//!
//! - [`batch`] -- The batch record and its status transitions
//! - [`config`] -- `holescan-config.yaml` loading
//! - [`control`] -- Shared pause/resume/stop flags for the tick loop
//! - [`driver`] -- Per-unit phases derived from the cursor
//! - [`error`] -- Lifecycle error types
//! - [`lifecycle`] -- [`BatchLifecycleManager`], sole owner of batch state
//! - [`runner`] -- [`run_batch`], the async tick loop
//! - [`sampler`] -- Seeded weighted outcome draws
//! - [`workflow`] -- [`InspectionWorkflow`], explicit component wiring

pub mod batch;
pub mod config;
pub mod control;
pub mod driver;
pub mod error;
pub mod lifecycle;
pub mod runner;
pub mod sampler;
pub mod workflow;

pub use batch::{Batch, BatchStatus, format_batch_id};
pub use config::{ConfigError, InspectionConfig};
pub use control::DriverControl;
pub use driver::{DetectionDriver, DriverCursor, DriverTick, InspectionLedger};
pub use error::BatchError;
pub use lifecycle::{BatchLifecycleManager, BatchTick, RecoveryMode, ResumeOutcome};
pub use runner::{
    BatchObserver, NoOpObserver, Pacing, RunEndReason, RunOptions, RunResult, RunnerError,
    run_batch,
};
pub use sampler::OutcomeSampler;
pub use workflow::{InspectionPlan, InspectionWorkflow, WorkflowError};
