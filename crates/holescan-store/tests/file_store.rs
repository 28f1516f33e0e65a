//! Integration tests for the on-disk snapshot store.
//!
//! Each test works in its own temporary directory.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::collections::BTreeMap;

use chrono::Utc;
use holescan_store::{
    BatchInfoRecord, DetectionStateRecord, FileSnapshotStore, SnapshotFile, SnapshotStore,
    StoreError,
};
use holescan_types::{BatchId, BatchSummary, HoleId, HoleStatus, SectorId, SimulationParams};

fn batch_info(batch: &str, number: u32) -> BatchInfoRecord {
    BatchInfoRecord {
        batch_id: BatchId::new(batch),
        product_id: "CAP1000".to_owned(),
        detection_number: number,
        is_mock: true,
        start_time: Utc::now(),
    }
}

fn detection_state() -> DetectionStateRecord {
    let mut results = BTreeMap::new();
    results.insert(HoleId::new("AC001R001"), HoleStatus::Qualified);
    results.insert(HoleId::new("AC001R002"), HoleStatus::Defective);
    DetectionStateRecord {
        current_index: 2,
        detection_results: results,
        pending_holes: vec![HoleId::new("AC002R001"), HoleId::new("AC002R002")],
        simulation_params: SimulationParams {
            seed: 42,
            ..SimulationParams::default()
        },
        elapsed_ms_within_current_unit: 4_300,
    }
}

#[test]
fn documents_live_in_one_directory_per_batch() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSnapshotStore::new(dir.path());
    let id = BatchId::new("CAP1000_检测001_20261016_101500_MOCK");

    store.save_batch_info(&batch_info(id.as_str(), 1)).unwrap();
    store.save_detection_state(&id, &detection_state()).unwrap();

    let batch_dir = dir.path().join(id.as_str());
    assert!(batch_dir.join("batch_info.json").is_file());
    assert!(batch_dir.join("detection_state.json").is_file());
    assert!(!batch_dir.join("batch_summary.json").exists());

    let state = store.load_detection_state(&id).unwrap();
    assert_eq!(state, detection_state());
    assert_eq!(store.load_batch_info(&id).unwrap().detection_number, 1);
}

#[test]
fn detection_state_uses_the_documented_field_names() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSnapshotStore::new(dir.path());
    let id = BatchId::new("b1");
    store.save_detection_state(&id, &detection_state()).unwrap();

    let raw = std::fs::read_to_string(store.path_of(&id, SnapshotFile::DetectionState)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["current_index"], 2);
    assert_eq!(json["detection_results"]["AC001R002"], "defective");
    assert_eq!(json["pending_holes"][0], "AC002R001");
    assert_eq!(json["simulation_params"]["seed"], 42);
    assert_eq!(json["elapsed_ms_within_current_unit"], 4_300);
}

#[test]
fn saving_again_replaces_the_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSnapshotStore::new(dir.path());
    let id = BatchId::new("b1");

    store.save_detection_state(&id, &detection_state()).unwrap();
    let mut later = detection_state();
    later.current_index = 5;
    later.elapsed_ms_within_current_unit = 0;
    store.save_detection_state(&id, &later).unwrap();

    assert_eq!(store.load_detection_state(&id).unwrap().current_index, 5);
}

#[test]
fn summary_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSnapshotStore::new(dir.path());
    let summary = BatchSummary::from_statuses(
        BatchId::new("b1"),
        vec![
            (SectorId::One, HoleStatus::Qualified),
            (SectorId::Two, HoleStatus::Defective),
        ],
        Utc::now(),
    );
    store.save_summary(&summary).unwrap();
    assert_eq!(store.load_summary(&summary.batch_id).unwrap(), summary);
}

#[test]
fn missing_and_corrupt_snapshots_are_distinguished() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSnapshotStore::new(dir.path());
    let id = BatchId::new("b1");

    assert!(matches!(
        store.load_detection_state(&id),
        Err(StoreError::MissingSnapshot { .. })
    ));

    std::fs::create_dir_all(store.batch_dir(&id)).unwrap();
    std::fs::write(store.path_of(&id, SnapshotFile::DetectionState), b"{\"current_index\":").unwrap();
    assert!(matches!(
        store.load_detection_state(&id),
        Err(StoreError::Serialization(_))
    ));
}

#[test]
fn highest_detection_number_is_found_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSnapshotStore::new(dir.path());
    store.save_batch_info(&batch_info("b1", 3)).unwrap();
    store.save_batch_info(&batch_info("b2", 11)).unwrap();
    let mut other = batch_info("b3", 40);
    other.product_id = "VLV20".to_owned();
    store.save_batch_info(&other).unwrap();

    let reopened = FileSnapshotStore::new(dir.path());
    assert_eq!(reopened.max_detection_number("CAP1000").unwrap(), 11);
    assert_eq!(reopened.max_detection_number("VLV20").unwrap(), 40);
}
