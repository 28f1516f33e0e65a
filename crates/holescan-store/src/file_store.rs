//! Directory-per-batch JSON store.
//!
//! Every write goes to a sibling `.tmp` file first and is then renamed over
//! the target, so readers only ever see a complete document.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use holescan_types::{BatchId, BatchSummary};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::records::{BatchInfoRecord, DetectionStateRecord};
use crate::snapshot_store::{SnapshotFile, SnapshotStore};

/// Snapshot store rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    root: PathBuf,
}

impl FileSnapshotStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one batch's documents.
    pub fn batch_dir(&self, batch_id: &BatchId) -> PathBuf {
        self.root.join(batch_id.as_str())
    }

    /// Full path of one document.
    pub fn path_of(&self, batch_id: &BatchId, file: SnapshotFile) -> PathBuf {
        self.batch_dir(batch_id).join(file.file_name())
    }

    fn write_json<T: Serialize>(
        &self,
        batch_id: &BatchId,
        file: SnapshotFile,
        value: &T,
    ) -> Result<(), StoreError> {
        let dir = self.batch_dir(batch_id);
        fs::create_dir_all(&dir)?;

        let path = dir.join(file.file_name());
        let tmp = dir.join(format!("{}.tmp", file.file_name()));
        let bytes = serde_json::to_vec_pretty(value)?;
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;

        debug!(batch_id = %batch_id, path = %path.display(), "Snapshot written");
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(
        &self,
        batch_id: &BatchId,
        file: SnapshotFile,
    ) -> Result<T, StoreError> {
        let path = self.path_of(batch_id, file);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::MissingSnapshot {
                    batch_id: batch_id.clone(),
                    file,
                });
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save_batch_info(&self, info: &BatchInfoRecord) -> Result<(), StoreError> {
        self.write_json(&info.batch_id, SnapshotFile::BatchInfo, info)
    }

    fn load_batch_info(&self, batch_id: &BatchId) -> Result<BatchInfoRecord, StoreError> {
        self.read_json(batch_id, SnapshotFile::BatchInfo)
    }

    fn save_detection_state(
        &self,
        batch_id: &BatchId,
        state: &DetectionStateRecord,
    ) -> Result<(), StoreError> {
        self.write_json(batch_id, SnapshotFile::DetectionState, state)
    }

    fn load_detection_state(&self, batch_id: &BatchId) -> Result<DetectionStateRecord, StoreError> {
        self.read_json(batch_id, SnapshotFile::DetectionState)
    }

    fn save_summary(&self, summary: &BatchSummary) -> Result<(), StoreError> {
        self.write_json(&summary.batch_id, SnapshotFile::Summary, summary)
    }

    fn load_summary(&self, batch_id: &BatchId) -> Result<BatchSummary, StoreError> {
        self.read_json(batch_id, SnapshotFile::Summary)
    }

    fn max_detection_number(&self, product_id: &str) -> Result<u32, StoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut max = 0;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let info_path = entry.path().join(SnapshotFile::BatchInfo.file_name());
            let info: BatchInfoRecord = match fs::read(&info_path)
                .map_err(StoreError::from)
                .and_then(|bytes| serde_json::from_slice(&bytes).map_err(StoreError::from))
            {
                Ok(info) => info,
                Err(e) => {
                    warn!(path = %info_path.display(), error = %e, "Skipping unreadable batch directory");
                    continue;
                }
            };
            if info.product_id == product_id {
                max = max.max(info.detection_number);
            }
        }
        Ok(max)
    }
}
