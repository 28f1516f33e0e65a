//! Error types for the snapshot store.

use holescan_types::BatchId;

use crate::snapshot_store::SnapshotFile;

/// Errors that can occur while reading or writing snapshots.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The requested snapshot has never been written.
    #[error("no {file} snapshot for batch {batch_id}")]
    MissingSnapshot {
        /// The batch that was looked up.
        batch_id: BatchId,
        /// Which document is missing.
        file: SnapshotFile,
    },
}
