//! Progress reporting for the running batch.
//!
//! [`ProgressLogger`] is the tick-loop observer: it logs whenever the
//! batch crosses a unit boundary. [`spawn_event_log`] follows the event
//! broadcast in a separate task and logs unit outcomes and batch
//! transitions as they are published.

use holescan_core::{Batch, BatchObserver};
use holescan_events::EventPublisher;
use holescan_types::{HoleStatus, InspectionEvent};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Logs an info line every `every` units and a debug line for each unit.
#[derive(Debug)]
pub struct ProgressLogger {
    total_units: usize,
    every: usize,
    last_index: Option<usize>,
}

impl ProgressLogger {
    /// Create a logger for a sequence of `total_units`, reporting every
    /// `every` units at info level.
    pub const fn new(total_units: usize, every: usize) -> Self {
        Self {
            total_units,
            every: if every == 0 { 1 } else { every },
            last_index: None,
        }
    }
}

impl BatchObserver for ProgressLogger {
    fn on_tick(&mut self, batch: &Batch) {
        if self.last_index == Some(batch.current_index) {
            return;
        }
        self.last_index = Some(batch.current_index);

        debug!(
            batch_id = %batch.batch_id,
            index = batch.current_index,
            total_units = self.total_units,
            "Unit boundary"
        );
        if batch.current_index.checked_rem(self.every) == Some(0) {
            info!(
                batch_id = %batch.batch_id,
                units_done = batch.current_index,
                total_units = self.total_units,
                holes_done = batch.completed_count(),
                holes_pending = batch.pending_ids.len(),
                "Batch progress"
            );
        }
    }
}

/// Follow the event broadcast until the publisher is dropped.
pub fn spawn_event_log(events: &EventPublisher) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event log fell behind, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn log_event(event: &InspectionEvent) {
    match event {
        InspectionEvent::UnitFinalized {
            batch_id,
            unit,
            outcomes,
        } => {
            let flagged = outcomes
                .iter()
                .filter(|o| o.status != HoleStatus::Qualified)
                .count();
            debug!(batch_id = %batch_id, index = unit.index, flagged, "Unit finalized");
            for outcome in outcomes.iter().filter(|o| o.status == HoleStatus::Defective) {
                info!(batch_id = %batch_id, hole_id = %outcome.hole_id, "Defective hole");
            }
        }
        InspectionEvent::BatchPaused {
            batch_id,
            current_index,
            elapsed_ms,
        } => {
            info!(batch_id = %batch_id, current_index, elapsed_ms, "Event: batch paused");
        }
        InspectionEvent::BatchResumed {
            batch_id,
            current_index,
            restarted,
            ..
        } => {
            info!(batch_id = %batch_id, current_index, restarted, "Event: batch resumed");
        }
        InspectionEvent::BatchTerminated { batch_id, reason } => {
            warn!(batch_id = %batch_id, reason = %reason, "Event: batch terminated");
        }
        InspectionEvent::BatchCompleted { summary } => {
            info!(
                batch_id = %summary.batch_id,
                qualification_rate = summary.qualification_rate,
                "Event: batch completed"
            );
        }
        InspectionEvent::UnitStarted { .. }
        | InspectionEvent::HoleStatusChanged { .. }
        | InspectionEvent::BatchProgress { .. } => {}
    }
}
