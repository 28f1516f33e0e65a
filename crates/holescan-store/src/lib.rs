//! Durable snapshot storage for inspection batches.
//!
//! Each batch owns one directory under the storage root holding up to three
//! JSON documents:
//!
//! ```text
//! <root>/<batch_id>/
//!     batch_info.json        identity, written at batch start
//!     detection_state.json   progress, written on pause and on completion
//!     batch_summary.json     final counts, written on completion
//! ```
//!
//! # Modules
//!
//! - [`records`] -- Serialized record shapes
//! - [`snapshot_store`] -- The [`SnapshotStore`] trait
//! - [`file_store`] -- Directory-per-batch store with atomic writes
//! - [`memory_store`] -- In-process store for tests and dry runs
//! - [`error`] -- Shared error types

pub mod error;
pub mod file_store;
pub mod memory_store;
pub mod records;
pub mod snapshot_store;

// Re-export primary types for convenience.
pub use error::StoreError;
pub use file_store::FileSnapshotStore;
pub use memory_store::InMemorySnapshotStore;
pub use records::{BatchInfoRecord, DetectionStateRecord};
pub use snapshot_store::{SnapshotFile, SnapshotStore};
