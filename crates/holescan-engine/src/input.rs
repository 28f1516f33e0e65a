//! Target list loading.
//!
//! The geometry provider hands over a JSON array of
//! [`TargetRecord`](holescan_types::TargetRecord)s:
//!
//! ```json
//! [{"id": "AC001R001", "x": 12.5, "y": -3.0, "diameter": 2.0, "side_label": "A"}]
//! ```

use std::path::Path;

use holescan_types::{Target, TargetRecord};
use tracing::info;

use crate::error::EngineError;

/// Read and parse the target file. Every target starts `Pending`.
pub fn load_targets(path: &Path) -> Result<Vec<Target>, EngineError> {
    let contents = std::fs::read_to_string(path).map_err(|source| EngineError::TargetsIo {
        path: path.to_path_buf(),
        source,
    })?;
    let targets = parse_targets(&contents).map_err(|source| EngineError::TargetsFormat {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), count = targets.len(), "Targets loaded");
    Ok(targets)
}

/// Parse a JSON array of target records.
pub fn parse_targets(json: &str) -> Result<Vec<Target>, serde_json::Error> {
    let records: Vec<TargetRecord> = serde_json::from_str(json)?;
    Ok(records.into_iter().map(TargetRecord::into_target).collect())
}
