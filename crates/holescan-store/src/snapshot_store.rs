//! The storage interface the batch lifecycle manager persists through.

use std::fmt;

use holescan_types::{BatchId, BatchSummary};

use crate::error::StoreError;
use crate::records::{BatchInfoRecord, DetectionStateRecord};

/// The documents kept for each batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SnapshotFile {
    /// `batch_info.json`
    BatchInfo,
    /// `detection_state.json`
    DetectionState,
    /// `batch_summary.json`
    Summary,
}

impl SnapshotFile {
    /// File name of this document inside a batch directory.
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::BatchInfo => "batch_info.json",
            Self::DetectionState => "detection_state.json",
            Self::Summary => "batch_summary.json",
        }
    }
}

impl fmt::Display for SnapshotFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Durable storage for batch snapshots.
///
/// Loads of a document that was never written fail with
/// [`StoreError::MissingSnapshot`]; a document that exists but cannot be
/// decoded fails with [`StoreError::Serialization`].
pub trait SnapshotStore: Send + Sync {
    /// Persist a batch's identity.
    fn save_batch_info(&self, info: &BatchInfoRecord) -> Result<(), StoreError>;

    /// Load a batch's identity.
    fn load_batch_info(&self, batch_id: &BatchId) -> Result<BatchInfoRecord, StoreError>;

    /// Persist a batch's progress, replacing any earlier snapshot.
    fn save_detection_state(
        &self,
        batch_id: &BatchId,
        state: &DetectionStateRecord,
    ) -> Result<(), StoreError>;

    /// Load a batch's last persisted progress.
    fn load_detection_state(&self, batch_id: &BatchId) -> Result<DetectionStateRecord, StoreError>;

    /// Persist a completed batch's summary.
    fn save_summary(&self, summary: &BatchSummary) -> Result<(), StoreError>;

    /// Load a completed batch's summary.
    fn load_summary(&self, batch_id: &BatchId) -> Result<BatchSummary, StoreError>;

    /// Highest detection number persisted for a product, or 0 if none.
    fn max_detection_number(&self, product_id: &str) -> Result<u32, StoreError>;
}
