//! Record shapes persisted by the snapshot store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use holescan_types::{BatchId, HoleId, HoleStatus, SimulationParams};
use serde::{Deserialize, Serialize};

/// Identity of a batch, written once when it starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchInfoRecord {
    /// The batch.
    pub batch_id: BatchId,
    /// Product code the batch inspects.
    pub product_id: String,
    /// Per-product sequence number.
    pub detection_number: u32,
    /// Whether outcomes are simulated.
    pub is_mock: bool,
    /// When the batch started.
    pub start_time: DateTime<Utc>,
}

/// Progress of a batch at the moment it was paused or completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionStateRecord {
    /// Index of the unit in progress (or the unit count once complete).
    pub current_index: usize,
    /// Final status of every hole that has one.
    pub detection_results: BTreeMap<HoleId, HoleStatus>,
    /// Holes not yet finalized, sorted by id.
    pub pending_holes: Vec<HoleId>,
    /// Parameters the batch runs with.
    pub simulation_params: SimulationParams,
    /// Time already spent on the unit at `current_index`.
    #[serde(default)]
    pub elapsed_ms_within_current_unit: u64,
}
