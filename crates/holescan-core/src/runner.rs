//! Tick loop with pause, resume, and stop controls.
//!
//! [`run_batch`] drives one batch from its current position to an end:
//!
//! - **Stop**: the batch is terminated and the loop returns.
//! - **Pause**: progress is snapshotted through the lifecycle manager, the
//!   loop waits for a resume (or stop), then restores from the snapshot.
//! - **Tick**: the manager advances the driver one tick interval.
//! - **Pacing**: sleep for the control's interval, or just yield.
//!
//! Controls are observed only between ticks.

use std::sync::Arc;
use std::time::Duration;

use holescan_types::{BatchId, BatchSummary};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::batch::{Batch, BatchStatus};
use crate::control::DriverControl;
use crate::error::BatchError;
use crate::lifecycle::{BatchLifecycleManager, BatchTick, RecoveryMode};

/// Errors that end the loop without a result.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A lifecycle operation failed outside of a tick.
    #[error("batch error: {source}")]
    Batch {
        /// The underlying lifecycle error.
        #[from]
        source: BatchError,
    },

    /// The batch cannot be ticked.
    #[error("batch {batch_id} is {status} and cannot be driven")]
    NotRunnable {
        /// The batch.
        batch_id: BatchId,
        /// Its status when the loop gave up.
        status: BatchStatus,
    },
}

/// How the loop spaces ticks in wall-clock time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    /// Sleep the control's tick interval between ticks.
    #[default]
    WallClock,
    /// Run ticks back to back, yielding to the scheduler in between.
    Immediate,
}

/// Why the loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEndReason {
    /// Every unit was processed.
    Completed,
    /// A stop was requested through [`DriverControl`].
    OperatorStop,
    /// A tick failed and the batch was terminated.
    DriverFailure {
        /// The failure, as published in `batch_terminated`.
        reason: String,
    },
}

/// Outcome of [`run_batch`].
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Why the loop ended.
    pub end_reason: RunEndReason,
    /// Ticks executed by this loop.
    pub ticks: u64,
    /// Final counts, when the batch completed.
    pub summary: Option<BatchSummary>,
}

/// Loop settings that do not change while the loop runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Wall-clock pacing.
    pub pacing: Pacing,
    /// Snapshot handling when resuming after a pause.
    pub recovery: RecoveryMode,
}

/// Callback invoked after each tick.
pub trait BatchObserver: Send {
    /// Called after a tick advanced the batch.
    fn on_tick(&mut self, batch: &Batch);
}

/// An observer that does nothing.
pub struct NoOpObserver;

impl BatchObserver for NoOpObserver {
    fn on_tick(&mut self, _batch: &Batch) {}
}

/// Drive a running batch until it completes, is stopped, or fails.
///
/// # Errors
///
/// Returns [`RunnerError::NotRunnable`] if the batch is not running or has
/// no driver attached, and [`RunnerError::Batch`] if pausing, resuming, or
/// terminating fails.
pub async fn run_batch(
    manager: &mut BatchLifecycleManager,
    batch_id: &BatchId,
    control: &Arc<DriverControl>,
    options: RunOptions,
    observer: &mut dyn BatchObserver,
) -> Result<RunResult, RunnerError> {
    let mut ticks: u64 = 0;

    info!(
        batch_id = %batch_id,
        pacing = ?options.pacing,
        tick_interval_ms = control.tick_interval_ms(),
        "Tick loop starting"
    );

    loop {
        // --- Check stop ---
        if control.is_stop_requested() {
            manager.terminate(batch_id, "operator stop")?;
            return Ok(finish(RunEndReason::OperatorStop, ticks, None));
        }

        // --- Check pause ---
        if control.is_paused() {
            manager.pause(batch_id)?;
            control.wait_while_paused().await;
            if control.is_stop_requested() {
                continue;
            }
            manager.resume(batch_id, options.recovery)?;
        }

        // --- Tick ---
        match manager.tick(batch_id) {
            Ok(BatchTick::Advanced) => {
                ticks = ticks.saturating_add(1);
                if let Some(batch) = manager.batch(batch_id) {
                    observer.on_tick(batch);
                }
            }
            Ok(BatchTick::Completed(summary)) => {
                ticks = ticks.saturating_add(1);
                return Ok(finish(RunEndReason::Completed, ticks, Some(summary)));
            }
            Ok(BatchTick::Idle) => {
                let status = manager
                    .batch(batch_id)
                    .map_or(BatchStatus::Terminated, |b| b.status);
                return Err(RunnerError::NotRunnable {
                    batch_id: batch_id.clone(),
                    status,
                });
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(batch_id = %batch_id, error = %reason, "Tick failed, terminating batch");
                if let Err(term) = manager.terminate(batch_id, &reason) {
                    warn!(batch_id = %batch_id, error = %term, "Could not terminate failed batch");
                }
                return Ok(finish(RunEndReason::DriverFailure { reason }, ticks, None));
            }
        }

        // --- Pace ---
        match options.pacing {
            Pacing::WallClock => {
                tokio::time::sleep(Duration::from_millis(control.tick_interval_ms())).await;
            }
            Pacing::Immediate => tokio::task::yield_now().await,
        }
    }
}

fn finish(end_reason: RunEndReason, ticks: u64, summary: Option<BatchSummary>) -> RunResult {
    info!(reason = ?end_reason, ticks, "Tick loop ended");
    RunResult {
        end_reason,
        ticks,
        summary,
    }
}
