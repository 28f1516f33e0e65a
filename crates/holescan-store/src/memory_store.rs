//! In-process snapshot store.
//!
//! Keeps serialized documents in memory so loads go through the same
//! decode path as the file store.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use holescan_types::{BatchId, BatchSummary};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;
use crate::records::{BatchInfoRecord, DetectionStateRecord};
use crate::snapshot_store::{SnapshotFile, SnapshotStore};

/// Snapshot store backed by a map of JSON documents.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    documents: Mutex<BTreeMap<(BatchId, SnapshotFile), String>>,
}

impl InMemorySnapshotStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop one stored document.
    pub fn remove(&self, batch_id: &BatchId, file: SnapshotFile) -> bool {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(batch_id.clone(), file))
            .is_some()
    }

    /// Overwrite one stored document with raw text.
    pub fn put_raw(&self, batch_id: &BatchId, file: SnapshotFile, raw: impl Into<String>) {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((batch_id.clone(), file), raw.into());
    }

    fn write<T: Serialize>(
        &self,
        batch_id: &BatchId,
        file: SnapshotFile,
        value: &T,
    ) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.put_raw(batch_id, file, raw);
        Ok(())
    }

    fn read<T: DeserializeOwned>(
        &self,
        batch_id: &BatchId,
        file: SnapshotFile,
    ) -> Result<T, StoreError> {
        let documents = self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let raw = documents
            .get(&(batch_id.clone(), file))
            .ok_or_else(|| StoreError::MissingSnapshot {
                batch_id: batch_id.clone(),
                file,
            })?;
        Ok(serde_json::from_str(raw)?)
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn save_batch_info(&self, info: &BatchInfoRecord) -> Result<(), StoreError> {
        self.write(&info.batch_id, SnapshotFile::BatchInfo, info)
    }

    fn load_batch_info(&self, batch_id: &BatchId) -> Result<BatchInfoRecord, StoreError> {
        self.read(batch_id, SnapshotFile::BatchInfo)
    }

    fn save_detection_state(
        &self,
        batch_id: &BatchId,
        state: &DetectionStateRecord,
    ) -> Result<(), StoreError> {
        self.write(batch_id, SnapshotFile::DetectionState, state)
    }

    fn load_detection_state(&self, batch_id: &BatchId) -> Result<DetectionStateRecord, StoreError> {
        self.read(batch_id, SnapshotFile::DetectionState)
    }

    fn save_summary(&self, summary: &BatchSummary) -> Result<(), StoreError> {
        self.write(&summary.batch_id, SnapshotFile::Summary, summary)
    }

    fn load_summary(&self, batch_id: &BatchId) -> Result<BatchSummary, StoreError> {
        self.read(batch_id, SnapshotFile::Summary)
    }

    fn max_detection_number(&self, product_id: &str) -> Result<u32, StoreError> {
        let documents = self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let max = documents
            .iter()
            .filter(|((_, file), _)| *file == SnapshotFile::BatchInfo)
            .filter_map(|(_, raw)| serde_json::from_str::<BatchInfoRecord>(raw).ok())
            .filter(|info| info.product_id == product_id)
            .map(|info| info.detection_number)
            .max()
            .unwrap_or(0);
        Ok(max)
    }
}
