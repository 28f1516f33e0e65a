//! Events published while a batch is inspected.
//!
//! Payloads are plain data, never references into engine state, so they can
//! be queued, serialized, or handed across execution contexts freely.

use serde::{Deserialize, Serialize};

use crate::enums::HoleStatus;
use crate::ids::{BatchId, HoleId};
use crate::structs::{BatchSummary, DetectionUnit, HoleOutcome};

/// A notification emitted by the detection driver or the batch lifecycle
/// manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InspectionEvent {
    /// A unit's probes moved onto its holes.
    UnitStarted {
        /// Owning batch.
        batch_id: BatchId,
        /// The unit that started.
        unit: DetectionUnit,
    },

    /// A hole changed status.
    HoleStatusChanged {
        /// Owning batch.
        batch_id: BatchId,
        /// The hole.
        hole_id: HoleId,
        /// Its new status.
        status: HoleStatus,
    },

    /// A unit finished its dwell.
    UnitFinalized {
        /// Owning batch.
        batch_id: BatchId,
        /// The unit that finished.
        unit: DetectionUnit,
        /// Final status of each hole in the unit.
        outcomes: Vec<HoleOutcome>,
    },

    /// The driver advanced to a new unit.
    BatchProgress {
        /// Owning batch.
        batch_id: BatchId,
        /// Index of the next unit to inspect.
        current_index: usize,
        /// Length of the unit sequence.
        total_units: usize,
    },

    /// Every unit has been processed.
    BatchCompleted {
        /// Final counts.
        summary: BatchSummary,
    },

    /// The batch was cancelled or its driver failed.
    BatchTerminated {
        /// Owning batch.
        batch_id: BatchId,
        /// Human-readable cause.
        reason: String,
    },

    /// The batch was paused and its progress persisted.
    BatchPaused {
        /// Owning batch.
        batch_id: BatchId,
        /// Index of the unit that was in progress.
        current_index: usize,
        /// Time already spent on that unit.
        elapsed_ms: u64,
    },

    /// The batch resumed from a persisted snapshot.
    ///
    /// A restart is preceded by a `HoleStatusChanged` to `Pending` for every
    /// hole the restart reset.
    BatchResumed {
        /// Owning batch.
        batch_id: BatchId,
        /// Index the driver resumed at.
        current_index: usize,
        /// Time already spent on that unit.
        elapsed_ms: u64,
        /// Whether the snapshot was unusable and the batch restarted from 0.
        restarted: bool,
    },
}

impl InspectionEvent {
    /// The batch this event belongs to.
    pub const fn batch_id(&self) -> &BatchId {
        match self {
            Self::UnitStarted { batch_id, .. }
            | Self::HoleStatusChanged { batch_id, .. }
            | Self::UnitFinalized { batch_id, .. }
            | Self::BatchProgress { batch_id, .. }
            | Self::BatchTerminated { batch_id, .. }
            | Self::BatchPaused { batch_id, .. }
            | Self::BatchResumed { batch_id, .. } => batch_id,
            Self::BatchCompleted { summary } => &summary.batch_id,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_name() {
        let event = InspectionEvent::HoleStatusChanged {
            batch_id: BatchId::new("b1"),
            hole_id: HoleId::new("AC001R001"),
            status: HoleStatus::InProgress,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "hole_status_changed");
        assert_eq!(json["status"], "in_progress");
        assert_eq!(event.batch_id().as_str(), "b1");
    }

    #[test]
    fn progress_round_trips() {
        let event = InspectionEvent::BatchProgress {
            batch_id: BatchId::new("b1"),
            current_index: 3,
            total_units: 10,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: InspectionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
