//! The batch record and its status state machine.
//!
//! ```text
//! Pending --> Running <--> Paused
//!               |            |
//!               v            |
//!           Completed        |
//!                            |
//! Pending | Running | Paused --> Terminated
//! ```
//!
//! `Completed` and `Terminated` are terminal.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use holescan_types::{BatchId, HoleId, HoleStatus, SimulationParams};
use serde::{Deserialize, Serialize};

/// Marker inserted between the product code and the detection number.
pub const DETECTION_MARKER: &str = "检测";

/// Suffix appended to the ids of simulated batches.
pub const MOCK_SUFFIX: &str = "_MOCK";

/// Timestamp layout used in batch ids.
pub const BATCH_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Lifecycle status of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Created, targets not yet installed.
    Pending,
    /// Being inspected.
    Running,
    /// Frozen with progress persisted.
    Paused,
    /// Every unit processed and the summary written.
    Completed,
    /// Cancelled or failed.
    Terminated,
}

impl BatchStatus {
    /// Whether no further transition is possible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Terminated)
    }

    /// Whether a batch in this status holds its product exclusively.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    /// Whether `self -> next` is a legal transition.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending | Self::Paused, Self::Running)
                | (Self::Running, Self::Paused | Self::Completed)
                | (Self::Pending | Self::Running | Self::Paused, Self::Terminated)
        )
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// One end-to-end inspection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Unique id, see [`format_batch_id`].
    pub batch_id: BatchId,
    /// Product code under inspection.
    pub product_id: String,
    /// Per-product sequence number.
    pub detection_number: u32,
    /// Whether outcomes are simulated.
    pub is_mock: bool,
    /// Lifecycle status.
    pub status: BatchStatus,
    /// Index of the unit in progress.
    pub current_index: usize,
    /// Final status of every finalized hole.
    pub results: BTreeMap<HoleId, HoleStatus>,
    /// Holes without a final status yet.
    pub pending_ids: BTreeSet<HoleId>,
    /// Timing and outcome rates.
    pub simulation_params: SimulationParams,
    /// When the batch was created.
    pub created_at: DateTime<Utc>,
    /// Last status or progress change.
    pub updated_at: DateTime<Utc>,
}

impl Batch {
    /// Create a pending batch with no targets.
    pub fn new(
        product_id: impl Into<String>,
        detection_number: u32,
        is_mock: bool,
        simulation_params: SimulationParams,
        created_at: DateTime<Utc>,
    ) -> Self {
        let product_id = product_id.into();
        Self {
            batch_id: format_batch_id(&product_id, detection_number, created_at, is_mock),
            product_id,
            detection_number,
            is_mock,
            status: BatchStatus::Pending,
            current_index: 0,
            results: BTreeMap::new(),
            pending_ids: BTreeSet::new(),
            simulation_params,
            created_at,
            updated_at: created_at,
        }
    }

    /// Number of holes with a final status.
    pub fn completed_count(&self) -> usize {
        self.results.len()
    }

    /// Move to `next` if the transition is legal. Returns the previous
    /// status, or `None` if the transition was rejected.
    pub fn transition(&mut self, next: BatchStatus) -> Option<BatchStatus> {
        if !self.status.can_transition_to(next) {
            return None;
        }
        let previous = self.status;
        self.status = next;
        self.touch();
        Some(previous)
    }

    /// Record a status change for one hole in the result bookkeeping.
    pub fn record_status(&mut self, hole: &HoleId, status: HoleStatus) {
        if status.is_final() {
            self.pending_ids.remove(hole);
            self.results.insert(hole.clone(), status);
        } else {
            self.results.remove(hole);
            self.pending_ids.insert(hole.clone());
        }
    }

    /// Bump `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Build a batch id: `{product}_检测{NNN}_{YYYYmmdd_HHMMSS}[_MOCK]`.
pub fn format_batch_id(
    product_id: &str,
    detection_number: u32,
    timestamp: DateTime<Utc>,
    is_mock: bool,
) -> BatchId {
    let suffix = if is_mock { MOCK_SUFFIX } else { "" };
    BatchId::new(format!(
        "{product_id}_{DETECTION_MARKER}{detection_number:03}_{}{suffix}",
        timestamp.format(BATCH_TIMESTAMP_FORMAT)
    ))
}
