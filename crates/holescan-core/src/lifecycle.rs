//! Batch lifecycle management.
//!
//! [`BatchLifecycleManager`] is the sole owner of every loaded batch, its
//! live targets, and its attached [`DetectionDriver`]. All state changes go
//! through it:
//!
//! - `create` allocates the batch id and detection number
//! - `start` installs the targets and writes `batch_info.json`
//! - `attach_driver` binds exactly one driver to a running batch
//! - `tick` advances the driver, completing the batch after the last unit
//! - `pause` / `resume` persist and restore progress
//! - `recover` reloads a paused batch after a process restart
//! - `complete` / `terminate` end the batch
//!
//! Every transition is published on the [`EventPublisher`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use holescan_events::EventPublisher;
use holescan_geometry::Partition;
use holescan_store::{BatchInfoRecord, DetectionStateRecord, SnapshotStore};
use holescan_types::{
    BatchId, BatchSummary, DetectionUnit, DriverId, HoleId, HoleStatus, InspectionEvent,
    SectorId, SimulationParams, Target,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::batch::{Batch, BatchStatus};
use crate::driver::{DetectionDriver, DriverCursor, DriverTick, InspectionLedger};
use crate::error::BatchError;

/// How `resume` treats a missing or unusable snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryMode {
    /// Warn and restart the batch from the first unit.
    #[default]
    Lenient,
    /// Fail with [`BatchError::StateRecovery`].
    Strict,
}

/// Result of a successful `resume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeOutcome {
    /// Index the driver continues from.
    pub current_index: usize,
    /// Time already spent on that unit.
    pub elapsed_ms: u64,
    /// Whether the snapshot was unusable and the batch restarted from 0.
    pub restarted: bool,
    /// Whether the batch was already running and nothing changed.
    pub already_running: bool,
}

/// Result of one `tick`.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchTick {
    /// Nothing happened: the batch is not running or has no driver.
    Idle,
    /// The driver advanced.
    Advanced,
    /// The last unit was finalized and the batch completed.
    Completed(BatchSummary),
}

/// Everything the manager keeps for one batch.
#[derive(Debug)]
struct BatchEntry {
    batch: Batch,
    targets: BTreeMap<HoleId, Target>,
    sectors: BTreeMap<HoleId, SectorId>,
    /// The sequence the driver was attached with; kept across pauses.
    units: Option<Vec<DetectionUnit>>,
    driver: Option<DetectionDriver>,
    summary: Option<BatchSummary>,
}

impl BatchEntry {
    fn new(batch: Batch) -> Self {
        Self {
            batch,
            targets: BTreeMap::new(),
            sectors: BTreeMap::new(),
            units: None,
            driver: None,
            summary: None,
        }
    }

    /// Where the batch stands right now.
    fn cursor(&self) -> DriverCursor {
        self.driver.as_ref().map_or(
            DriverCursor {
                index: self.batch.current_index,
                elapsed_ms: 0,
            },
            DetectionDriver::cursor,
        )
    }

    fn detection_state(&self) -> DetectionStateRecord {
        let cursor = self.cursor();
        DetectionStateRecord {
            current_index: cursor.index,
            detection_results: self.batch.results.clone(),
            pending_holes: self.batch.pending_ids.iter().cloned().collect(),
            simulation_params: self.batch.simulation_params,
            elapsed_ms_within_current_unit: cursor.elapsed_ms,
        }
    }

    /// Put every target back to `Pending` and rewind to the first unit.
    ///
    /// Returns the holes whose status changed.
    fn reset_progress(&mut self) -> Vec<HoleId> {
        let mut reset = Vec::new();
        for target in self.targets.values_mut() {
            if target.status != HoleStatus::Pending {
                target.status = HoleStatus::Pending;
                reset.push(target.id.clone());
            }
        }
        self.batch.results.clear();
        self.batch.pending_ids = self.targets.keys().cloned().collect();
        self.batch.current_index = 0;
        reset
    }

    fn install_targets(&mut self, targets: Vec<Target>, partition: &Partition) {
        self.targets = targets
            .into_iter()
            .map(|mut t| {
                t.status = HoleStatus::Pending;
                (t.id.clone(), t)
            })
            .collect();
        self.sectors = partition
            .assignments()
            .map(|(id, sector)| (id.clone(), sector))
            .collect();
        self.reset_progress();
    }
}

/// The [`InspectionLedger`] a driver sees during one tick.
struct LiveLedger<'a> {
    batch: &'a mut Batch,
    targets: &'a mut BTreeMap<HoleId, Target>,
    events: &'a EventPublisher,
}

impl InspectionLedger for LiveLedger<'_> {
    fn batch_id(&self) -> &BatchId {
        &self.batch.batch_id
    }

    fn status_of(&self, hole: &HoleId) -> Option<HoleStatus> {
        self.targets.get(hole).map(|t| t.status)
    }

    fn set_status(&mut self, hole: &HoleId, status: HoleStatus) -> bool {
        let Some(target) = self.targets.get_mut(hole) else {
            return false;
        };
        target.status = status;
        self.batch.record_status(hole, status);
        true
    }

    fn set_current_index(&mut self, index: usize) {
        self.batch.current_index = index;
        self.batch.touch();
    }

    fn publish(&self, event: InspectionEvent) {
        self.events.publish(event);
    }
}

/// Owns batches and drives them through their lifecycle.
pub struct BatchLifecycleManager {
    store: Arc<dyn SnapshotStore>,
    events: EventPublisher,
    batches: BTreeMap<BatchId, BatchEntry>,
    /// Highest detection number handed out per product in this process.
    counters: BTreeMap<String, u32>,
}

impl std::fmt::Debug for BatchLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchLifecycleManager")
            .field("batches", &self.batches.len())
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl BatchLifecycleManager {
    /// Create a manager persisting through `store` and publishing on
    /// `events`.
    pub fn new(store: Arc<dyn SnapshotStore>, events: EventPublisher) -> Self {
        Self {
            store,
            events,
            batches: BTreeMap::new(),
            counters: BTreeMap::new(),
        }
    }

    /// The event bus.
    pub const fn events(&self) -> &EventPublisher {
        &self.events
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Create a pending batch for a product.
    ///
    /// # Errors
    ///
    /// [`BatchError::SimulationConfig`] for invalid parameters,
    /// [`BatchError::Conflict`] if the product already has a running or
    /// paused batch, and [`BatchError::Store`] if the detection number
    /// history cannot be read.
    pub fn create(
        &mut self,
        product_id: &str,
        is_mock: bool,
        params: SimulationParams,
    ) -> Result<Batch, BatchError> {
        params.validate()?;
        if let Some(active) = self.active_batch_for(product_id, None) {
            return Err(BatchError::Conflict {
                batch_id: active.clone(),
                reason: format!("product {product_id} already has an active batch"),
            });
        }

        let persisted = self.store.max_detection_number(product_id)?;
        let last = self
            .counters
            .get(product_id)
            .copied()
            .unwrap_or(0)
            .max(persisted);
        let number = last
            .checked_add(1)
            .ok_or_else(|| BatchError::DetectionNumberExhausted {
                product_id: product_id.to_owned(),
            })?;
        self.counters.insert(product_id.to_owned(), number);

        let batch = Batch::new(product_id, number, is_mock, params, Utc::now());
        info!(
            batch_id = %batch.batch_id,
            product_id,
            detection_number = number,
            is_mock,
            "Batch created"
        );
        self.batches
            .insert(batch.batch_id.clone(), BatchEntry::new(batch.clone()));
        Ok(batch)
    }

    /// Install the live targets and sector map, then start the batch.
    ///
    /// # Errors
    ///
    /// [`BatchError::UnknownBatch`], [`BatchError::InvalidTransition`] if
    /// the batch is not pending, [`BatchError::Conflict`] if another batch
    /// of the product became active, [`BatchError::TargetSet`] if the
    /// partition does not cover the targets exactly, and
    /// [`BatchError::Store`] if `batch_info.json` cannot be written.
    pub fn start(
        &mut self,
        batch_id: &BatchId,
        targets: Vec<Target>,
        partition: &Partition,
    ) -> Result<(), BatchError> {
        let entry = self.entry(batch_id)?;
        let product_id = entry.batch.product_id.clone();
        if entry.batch.status != BatchStatus::Pending {
            return Err(BatchError::InvalidTransition {
                batch_id: batch_id.clone(),
                from: entry.batch.status,
                to: BatchStatus::Running,
            });
        }
        if let Some(active) = self.active_batch_for(&product_id, Some(batch_id)) {
            return Err(BatchError::Conflict {
                batch_id: batch_id.clone(),
                reason: format!("batch {active} is already active for product {product_id}"),
            });
        }
        Self::check_targets(batch_id, &targets, partition)?;

        let store = Arc::clone(&self.store);
        let entry = self.entry_mut(batch_id)?;
        entry.install_targets(targets, partition);
        store.save_batch_info(&BatchInfoRecord {
            batch_id: batch_id.clone(),
            product_id,
            detection_number: entry.batch.detection_number,
            is_mock: entry.batch.is_mock,
            start_time: entry.batch.created_at,
        })?;
        entry.batch.transition(BatchStatus::Running);

        info!(batch_id = %batch_id, targets = entry.targets.len(), "Batch started");
        Ok(())
    }

    /// Bind a detection driver to a running batch.
    ///
    /// # Errors
    ///
    /// [`BatchError::NotRunning`], [`BatchError::Conflict`] if a driver is
    /// already attached, and [`BatchError::UnitSequence`] if the sequence
    /// does not reference the live target set exactly once.
    pub fn attach_driver(
        &mut self,
        batch_id: &BatchId,
        units: Vec<DetectionUnit>,
    ) -> Result<DriverId, BatchError> {
        let entry = self.entry_mut(batch_id)?;
        if entry.batch.status != BatchStatus::Running {
            return Err(BatchError::NotRunning {
                batch_id: batch_id.clone(),
                status: entry.batch.status,
            });
        }
        if let Some(driver) = &entry.driver {
            return Err(BatchError::Conflict {
                batch_id: batch_id.clone(),
                reason: format!("driver {} is already attached", driver.id()),
            });
        }
        check_units(batch_id, &units, &entry.targets)?;

        let cursor = DriverCursor {
            index: entry.batch.current_index,
            elapsed_ms: 0,
        };
        let driver =
            DetectionDriver::with_cursor(units.clone(), entry.batch.simulation_params, cursor);
        let driver_id = driver.id();
        entry.units = Some(units);
        entry.driver = Some(driver);

        info!(batch_id = %batch_id, driver_id = %driver_id, "Driver attached");
        Ok(driver_id)
    }

    // -----------------------------------------------------------------------
    // Ticking
    // -----------------------------------------------------------------------

    /// Advance the attached driver by one tick.
    ///
    /// # Errors
    ///
    /// [`BatchError::UnknownBatch`], or any error from [`complete`](Self::complete)
    /// when the last unit finishes.
    pub fn tick(&mut self, batch_id: &BatchId) -> Result<BatchTick, BatchError> {
        let entry = self
            .batches
            .get_mut(batch_id)
            .ok_or_else(|| BatchError::UnknownBatch {
                batch_id: batch_id.clone(),
            })?;
        if entry.batch.status != BatchStatus::Running {
            return Ok(BatchTick::Idle);
        }
        let BatchEntry {
            batch,
            targets,
            driver,
            ..
        } = entry;
        let Some(driver) = driver.as_mut() else {
            return Ok(BatchTick::Idle);
        };

        let mut ledger = LiveLedger {
            batch,
            targets,
            events: &self.events,
        };
        let outcome = driver.tick(&mut ledger);
        match outcome {
            DriverTick::Advanced => Ok(BatchTick::Advanced),
            DriverTick::Finished => self.complete(batch_id).map(BatchTick::Completed),
        }
    }

    // -----------------------------------------------------------------------
    // Pause / Resume / Recover
    // -----------------------------------------------------------------------

    /// Freeze a running batch and persist its progress. Pausing a paused
    /// batch does nothing.
    ///
    /// # Errors
    ///
    /// [`BatchError::InvalidTransition`] unless the batch is running or
    /// paused, and [`BatchError::Store`] if the snapshot cannot be written.
    pub fn pause(&mut self, batch_id: &BatchId) -> Result<(), BatchError> {
        let store = Arc::clone(&self.store);
        let entry = self.entry_mut(batch_id)?;
        if entry.batch.status == BatchStatus::Paused {
            return Ok(());
        }
        Self::check_transition(&entry.batch, BatchStatus::Paused)?;

        let state = entry.detection_state();
        store.save_detection_state(batch_id, &state)?;
        entry.batch.current_index = state.current_index;
        entry.driver = None;
        entry.batch.transition(BatchStatus::Paused);

        info!(
            batch_id = %batch_id,
            index = state.current_index,
            elapsed_ms = state.elapsed_ms_within_current_unit,
            completed = entry.batch.completed_count(),
            "Batch paused"
        );
        self.events.publish(InspectionEvent::BatchPaused {
            batch_id: batch_id.clone(),
            current_index: state.current_index,
            elapsed_ms: state.elapsed_ms_within_current_unit,
        });
        Ok(())
    }

    /// Continue a paused batch from its persisted snapshot. Resuming a
    /// running batch does nothing.
    ///
    /// # Errors
    ///
    /// [`BatchError::InvalidTransition`] unless the batch is paused or
    /// running, and [`BatchError::StateRecovery`] in
    /// [`RecoveryMode::Strict`] when the snapshot is missing or invalid.
    pub fn resume(
        &mut self,
        batch_id: &BatchId,
        mode: RecoveryMode,
    ) -> Result<ResumeOutcome, BatchError> {
        let store = Arc::clone(&self.store);
        let entry = self.entry_mut(batch_id)?;
        if entry.batch.status == BatchStatus::Running {
            let cursor = entry.cursor();
            return Ok(ResumeOutcome {
                current_index: cursor.index,
                elapsed_ms: cursor.elapsed_ms,
                restarted: false,
                already_running: true,
            });
        }
        if entry.batch.status != BatchStatus::Paused {
            return Err(BatchError::InvalidTransition {
                batch_id: batch_id.clone(),
                from: entry.batch.status,
                to: BatchStatus::Running,
            });
        }

        let loaded = store
            .load_detection_state(batch_id)
            .map_err(|e| e.to_string())
            .and_then(|state| check_snapshot(&state, entry).map(|()| state));

        let (cursor, reset_holes) = match loaded {
            Ok(state) => (apply_snapshot(entry, &state), None),
            Err(reason) => match mode {
                RecoveryMode::Strict => {
                    return Err(BatchError::StateRecovery {
                        batch_id: batch_id.clone(),
                        reason,
                    });
                }
                RecoveryMode::Lenient => {
                    warn!(
                        batch_id = %batch_id,
                        reason = %reason,
                        "Snapshot unusable, restarting batch from the first unit"
                    );
                    (DriverCursor::default(), Some(entry.reset_progress()))
                }
            },
        };

        let restarted = reset_holes.is_some();
        entry.driver = entry.units.clone().map(|units| {
            DetectionDriver::with_cursor(units, entry.batch.simulation_params, cursor)
        });
        entry.batch.transition(BatchStatus::Running);

        info!(
            batch_id = %batch_id,
            index = cursor.index,
            elapsed_ms = cursor.elapsed_ms,
            restarted,
            "Batch resumed"
        );
        for hole_id in reset_holes.unwrap_or_default() {
            self.events.publish(InspectionEvent::HoleStatusChanged {
                batch_id: batch_id.clone(),
                hole_id,
                status: HoleStatus::Pending,
            });
        }
        self.events.publish(InspectionEvent::BatchResumed {
            batch_id: batch_id.clone(),
            current_index: cursor.index,
            elapsed_ms: cursor.elapsed_ms,
            restarted,
        });
        Ok(ResumeOutcome {
            current_index: cursor.index,
            elapsed_ms: cursor.elapsed_ms,
            restarted,
            already_running: false,
        })
    }

    /// Reload a batch persisted by an earlier process as `Paused`, ready
    /// for [`resume`](Self::resume).
    ///
    /// # Errors
    ///
    /// [`BatchError::Conflict`] if the batch is already loaded or its
    /// product has an active batch, [`BatchError::StateRecovery`] if
    /// `batch_info.json` is unreadable, and [`BatchError::TargetSet`] /
    /// [`BatchError::UnitSequence`] for inconsistent inputs.
    pub fn recover(
        &mut self,
        batch_id: &BatchId,
        targets: Vec<Target>,
        partition: &Partition,
        units: Vec<DetectionUnit>,
    ) -> Result<(), BatchError> {
        if self.batches.contains_key(batch_id) {
            return Err(BatchError::Conflict {
                batch_id: batch_id.clone(),
                reason: "batch is already loaded".to_owned(),
            });
        }
        let info = self
            .store
            .load_batch_info(batch_id)
            .map_err(|e| BatchError::StateRecovery {
                batch_id: batch_id.clone(),
                reason: e.to_string(),
            })?;
        if let Some(active) = self.active_batch_for(&info.product_id, None) {
            return Err(BatchError::Conflict {
                batch_id: batch_id.clone(),
                reason: format!(
                    "batch {active} is already active for product {}",
                    info.product_id
                ),
            });
        }
        Self::check_targets(batch_id, &targets, partition)?;

        let params = match self.store.load_detection_state(batch_id) {
            Ok(state) => state.simulation_params,
            Err(e) => {
                warn!(batch_id = %batch_id, error = %e, "No usable detection state, using default parameters");
                SimulationParams::default()
            }
        };

        let mut batch = Batch::new(
            info.product_id.clone(),
            info.detection_number,
            info.is_mock,
            params,
            info.start_time,
        );
        batch.batch_id = info.batch_id.clone();
        batch.status = BatchStatus::Paused;

        let mut entry = BatchEntry::new(batch);
        entry.install_targets(targets, partition);
        check_units(batch_id, &units, &entry.targets)?;
        entry.units = Some(units);

        let counter = self.counters.entry(info.product_id.clone()).or_insert(0);
        *counter = (*counter).max(info.detection_number);
        self.batches.insert(batch_id.clone(), entry);

        info!(batch_id = %batch_id, product_id = %info.product_id, "Batch recovered as paused");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Completion / Termination
    // -----------------------------------------------------------------------

    /// Compute and persist the summary of a fully inspected batch.
    ///
    /// # Errors
    ///
    /// [`BatchError::InvalidTransition`] unless the batch is running,
    /// [`BatchError::Incomplete`] if holes remain unfinished, and
    /// [`BatchError::Store`] if the summary cannot be written.
    pub fn complete(&mut self, batch_id: &BatchId) -> Result<BatchSummary, BatchError> {
        let store = Arc::clone(&self.store);
        let entry = self.entry_mut(batch_id)?;
        Self::check_transition(&entry.batch, BatchStatus::Completed)?;
        if !entry.batch.pending_ids.is_empty() {
            return Err(BatchError::Incomplete {
                batch_id: batch_id.clone(),
                remaining: entry.batch.pending_ids.len(),
            });
        }

        let summary = BatchSummary::from_statuses(
            batch_id.clone(),
            entry.targets.values().map(|t| {
                let sector = entry.sectors.get(&t.id).copied().unwrap_or(SectorId::One);
                (sector, t.status)
            }),
            Utc::now(),
        );
        store.save_summary(&summary)?;
        store.save_detection_state(batch_id, &entry.detection_state())?;

        entry.driver = None;
        entry.summary = Some(summary.clone());
        entry.batch.transition(BatchStatus::Completed);

        info!(
            batch_id = %batch_id,
            total = summary.total,
            qualified = summary.qualified,
            defective = summary.defective,
            qualification_rate = summary.qualification_rate,
            "Batch completed"
        );
        self.events.publish(InspectionEvent::BatchCompleted {
            summary: summary.clone(),
        });
        Ok(summary)
    }

    /// Cancel a batch. Holes of the unit in progress become `Error`; holes
    /// not yet reached stay `Pending`.
    ///
    /// # Errors
    ///
    /// [`BatchError::InvalidTransition`] if the batch already ended.
    pub fn terminate(&mut self, batch_id: &BatchId, reason: &str) -> Result<(), BatchError> {
        let entry = self
            .batches
            .get_mut(batch_id)
            .ok_or_else(|| BatchError::UnknownBatch {
                batch_id: batch_id.clone(),
            })?;
        Self::check_transition(&entry.batch, BatchStatus::Terminated)?;

        let in_progress: Vec<HoleId> = entry
            .targets
            .values()
            .filter(|t| t.status == HoleStatus::InProgress)
            .map(|t| t.id.clone())
            .collect();
        let mut ledger = LiveLedger {
            batch: &mut entry.batch,
            targets: &mut entry.targets,
            events: &self.events,
        };
        for hole_id in in_progress {
            ledger.set_status(&hole_id, HoleStatus::Error);
            ledger.publish(InspectionEvent::HoleStatusChanged {
                batch_id: batch_id.clone(),
                hole_id,
                status: HoleStatus::Error,
            });
        }

        entry.driver = None;
        entry.batch.transition(BatchStatus::Terminated);

        warn!(batch_id = %batch_id, reason, "Batch terminated");
        self.events.publish(InspectionEvent::BatchTerminated {
            batch_id: batch_id.clone(),
            reason: reason.to_owned(),
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// A loaded batch.
    pub fn batch(&self, batch_id: &BatchId) -> Option<&Batch> {
        self.batches.get(batch_id).map(|e| &e.batch)
    }

    /// One live target of a batch.
    pub fn target(&self, batch_id: &BatchId, hole: &HoleId) -> Option<&Target> {
        self.batches.get(batch_id).and_then(|e| e.targets.get(hole))
    }

    /// All live targets of a batch, sorted by id.
    pub fn targets(&self, batch_id: &BatchId) -> impl Iterator<Item = &Target> {
        self.batches
            .get(batch_id)
            .into_iter()
            .flat_map(|e| e.targets.values())
    }

    /// Sector a hole was assigned to.
    pub fn sector_of(&self, batch_id: &BatchId, hole: &HoleId) -> Option<SectorId> {
        self.batches
            .get(batch_id)
            .and_then(|e| e.sectors.get(hole).copied())
    }

    /// The summary of a completed batch.
    pub fn summary(&self, batch_id: &BatchId) -> Option<&BatchSummary> {
        self.batches.get(batch_id).and_then(|e| e.summary.as_ref())
    }

    /// Driver position of a batch, or its persisted index when no driver is
    /// attached.
    pub fn cursor(&self, batch_id: &BatchId) -> Option<DriverCursor> {
        self.batches.get(batch_id).map(BatchEntry::cursor)
    }

    /// Whether a driver is attached.
    pub fn has_driver(&self, batch_id: &BatchId) -> bool {
        self.batches
            .get(batch_id)
            .is_some_and(|e| e.driver.is_some())
    }

    /// Ids of all loaded batches.
    pub fn batch_ids(&self) -> impl Iterator<Item = &BatchId> {
        self.batches.keys()
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn entry(&self, batch_id: &BatchId) -> Result<&BatchEntry, BatchError> {
        self.batches
            .get(batch_id)
            .ok_or_else(|| BatchError::UnknownBatch {
                batch_id: batch_id.clone(),
            })
    }

    fn entry_mut(&mut self, batch_id: &BatchId) -> Result<&mut BatchEntry, BatchError> {
        self.batches
            .get_mut(batch_id)
            .ok_or_else(|| BatchError::UnknownBatch {
                batch_id: batch_id.clone(),
            })
    }

    /// An active batch of the product, other than `except`.
    fn active_batch_for(&self, product_id: &str, except: Option<&BatchId>) -> Option<&BatchId> {
        self.batches
            .values()
            .filter(|e| Some(&e.batch.batch_id) != except)
            .find(|e| e.batch.product_id == product_id && e.batch.status.is_active())
            .map(|e| &e.batch.batch_id)
    }

    fn check_transition(batch: &Batch, to: BatchStatus) -> Result<(), BatchError> {
        if batch.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(BatchError::InvalidTransition {
                batch_id: batch.batch_id.clone(),
                from: batch.status,
                to,
            })
        }
    }

    fn check_targets(
        batch_id: &BatchId,
        targets: &[Target],
        partition: &Partition,
    ) -> Result<(), BatchError> {
        if targets.is_empty() {
            return Err(BatchError::TargetSet {
                batch_id: batch_id.clone(),
                reason: "no targets".to_owned(),
            });
        }
        let unique: BTreeSet<&HoleId> = targets.iter().map(|t| &t.id).collect();
        if unique.len() != targets.len() {
            return Err(BatchError::TargetSet {
                batch_id: batch_id.clone(),
                reason: "duplicate target ids".to_owned(),
            });
        }
        if !partition.covers_exactly(unique) {
            return Err(BatchError::TargetSet {
                batch_id: batch_id.clone(),
                reason: "partition does not cover the target set exactly".to_owned(),
            });
        }
        Ok(())
    }
}

/// A unit sequence must be indexed `0..n` and reference every live target
/// exactly once.
fn check_units(
    batch_id: &BatchId,
    units: &[DetectionUnit],
    targets: &BTreeMap<HoleId, Target>,
) -> Result<(), BatchError> {
    let fail = |reason: String| BatchError::UnitSequence {
        batch_id: batch_id.clone(),
        reason,
    };

    let mut seen: BTreeSet<&HoleId> = BTreeSet::new();
    for (position, unit) in units.iter().enumerate() {
        if unit.index != position {
            return Err(fail(format!(
                "unit at position {position} carries index {}",
                unit.index
            )));
        }
        for hole in unit.hole_ids() {
            if !targets.contains_key(hole) {
                return Err(fail(format!("unit {position} references unknown hole {hole}")));
            }
            if !seen.insert(hole) {
                return Err(fail(format!("hole {hole} appears in more than one unit")));
            }
        }
    }
    if seen.len() != targets.len() {
        return Err(fail(format!(
            "{} of {} holes are covered",
            seen.len(),
            targets.len()
        )));
    }
    Ok(())
}

/// Check a persisted snapshot against the live batch.
fn check_snapshot(state: &DetectionStateRecord, entry: &BatchEntry) -> Result<(), String> {
    state
        .simulation_params
        .validate()
        .map_err(|e| e.to_string())?;

    let total_units = entry.units.as_ref().map_or(0, Vec::len);
    if entry.units.is_some() && state.current_index > total_units {
        return Err(format!(
            "current_index {} exceeds the {total_units} units",
            state.current_index
        ));
    }
    if state.elapsed_ms_within_current_unit >= state.simulation_params.unit_dwell_ms {
        return Err(format!(
            "elapsed {} ms is not within the {} ms dwell",
            state.elapsed_ms_within_current_unit, state.simulation_params.unit_dwell_ms
        ));
    }

    let mut covered: BTreeSet<&HoleId> = BTreeSet::new();
    for (hole, status) in &state.detection_results {
        if !entry.targets.contains_key(hole) {
            return Err(format!("result for unknown hole {hole}"));
        }
        if !status.is_final() {
            return Err(format!("result for {hole} is not final"));
        }
        covered.insert(hole);
    }
    for hole in &state.pending_holes {
        if !entry.targets.contains_key(hole) {
            return Err(format!("unknown pending hole {hole}"));
        }
        if !covered.insert(hole) {
            return Err(format!("hole {hole} is both pending and finished"));
        }
    }
    if covered.len() != entry.targets.len() {
        return Err(format!(
            "snapshot covers {} of {} holes",
            covered.len(),
            entry.targets.len()
        ));
    }
    Ok(())
}

/// Restore statuses and the cursor from a validated snapshot.
fn apply_snapshot(entry: &mut BatchEntry, state: &DetectionStateRecord) -> DriverCursor {
    for target in entry.targets.values_mut() {
        target.status = state
            .detection_results
            .get(&target.id)
            .copied()
            .unwrap_or(HoleStatus::Pending);
    }

    let cursor = DriverCursor {
        index: state.current_index,
        elapsed_ms: state.elapsed_ms_within_current_unit,
    };
    if cursor.elapsed_ms > 0 {
        let current = entry
            .units
            .as_ref()
            .and_then(|units| units.get(cursor.index));
        if let Some(unit) = current {
            for hole in unit.hole_ids() {
                if let Some(target) = entry.targets.get_mut(hole) {
                    if target.status == HoleStatus::Pending {
                        target.status = HoleStatus::InProgress;
                    }
                }
            }
        }
    }

    entry.batch.results = state.detection_results.clone();
    entry.batch.pending_ids = state.pending_holes.iter().cloned().collect();
    entry.batch.current_index = state.current_index;
    entry.batch.simulation_params = state.simulation_params;
    cursor
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use holescan_events::EventRecorder;
    use holescan_geometry::{GeometryPartitioner, PathPlanner};
    use holescan_store::{InMemorySnapshotStore, SnapshotFile};
    use holescan_types::Side;

    use super::*;

    fn fast_params() -> SimulationParams {
        SimulationParams {
            tick_interval_ms: 100,
            unit_dwell_ms: 300,
            reveal_offset_ms: 200,
            qualified_rate: 1.0,
            defective_rate: 0.0,
            blind_rate: 0.0,
            seed: 5,
        }
    }

    fn grid(columns: u32, rows: u32) -> Vec<Target> {
        let mut targets = Vec::new();
        for c in 1..=columns {
            for r in 1..=rows {
                targets.push(Target::new(
                    HoleId::from_parts(Side::A, c, r),
                    f64::from(c) - 2.5,
                    f64::from(r) - 1.5,
                    1.0,
                    Side::A,
                ));
            }
        }
        targets
    }

    struct Fixture {
        store: Arc<InMemorySnapshotStore>,
        recorder: EventRecorder,
        manager: BatchLifecycleManager,
        targets: Vec<Target>,
        partition: Partition,
        units: Vec<DetectionUnit>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemorySnapshotStore::new());
        let events = EventPublisher::new();
        let recorder = EventRecorder::new();
        events.add_listener(recorder.clone());
        let manager = BatchLifecycleManager::new(Arc::clone(&store) as Arc<dyn SnapshotStore>, events);
        let targets = grid(4, 2);
        let partition = GeometryPartitioner::default().partition(&targets).unwrap();
        let units = PathPlanner::new().plan(&targets).unwrap();
        Fixture {
            store,
            recorder,
            manager,
            targets,
            partition,
            units,
        }
    }

    fn running(f: &mut Fixture) -> BatchId {
        let batch = f.manager.create("CAP1000", true, fast_params()).unwrap();
        f.manager
            .start(&batch.batch_id, f.targets.clone(), &f.partition)
            .unwrap();
        f.manager
            .attach_driver(&batch.batch_id, f.units.clone())
            .unwrap();
        batch.batch_id
    }

    #[test]
    fn create_allocates_sequential_numbers() {
        let mut f = fixture();
        let first = f.manager.create("CAP1000", true, fast_params()).unwrap();
        assert_eq!(first.detection_number, 1);
        assert!(first.batch_id.as_str().starts_with("CAP1000_检测001_"));
        assert!(first.batch_id.as_str().ends_with("_MOCK"));
        assert_eq!(first.status, BatchStatus::Pending);

        let second = f.manager.create("CAP1000", false, fast_params()).unwrap();
        assert_eq!(second.detection_number, 2);
        assert!(!second.batch_id.as_str().ends_with("_MOCK"));
    }

    #[test]
    fn create_continues_from_persisted_numbers() {
        let mut f = fixture();
        f.store
            .save_batch_info(&BatchInfoRecord {
                batch_id: BatchId::new("old"),
                product_id: "CAP1000".to_owned(),
                detection_number: 41,
                is_mock: false,
                start_time: Utc::now(),
            })
            .unwrap();
        let batch = f.manager.create("CAP1000", true, fast_params()).unwrap();
        assert_eq!(batch.detection_number, 42);
        assert!(batch.batch_id.as_str().contains("检测042"));
    }

    #[test]
    fn create_rejects_invalid_params() {
        let mut f = fixture();
        let params = SimulationParams {
            qualified_rate: 0.9,
            defective_rate: 0.2,
            ..fast_params()
        };
        assert!(matches!(
            f.manager.create("CAP1000", true, params),
            Err(BatchError::SimulationConfig(_))
        ));
    }

    #[test]
    fn second_active_batch_for_a_product_conflicts() {
        let mut f = fixture();
        let id = running(&mut f);
        assert!(matches!(
            f.manager.create("CAP1000", true, fast_params()),
            Err(BatchError::Conflict { .. })
        ));
        f.manager.pause(&id).unwrap();
        assert!(matches!(
            f.manager.create("CAP1000", true, fast_params()),
            Err(BatchError::Conflict { .. })
        ));
        assert!(f.manager.create("VLV20", true, fast_params()).is_ok());
    }

    #[test]
    fn start_writes_batch_info() {
        let mut f = fixture();
        let id = running(&mut f);
        let info = f.store.load_batch_info(&id).unwrap();
        assert_eq!(info.product_id, "CAP1000");
        assert_eq!(info.detection_number, 1);
        assert!(info.is_mock);

        let batch = f.manager.batch(&id).unwrap();
        assert_eq!(batch.status, BatchStatus::Running);
        assert_eq!(batch.pending_ids.len(), 8);
    }

    #[test]
    fn second_driver_conflicts() {
        let mut f = fixture();
        let id = running(&mut f);
        assert!(matches!(
            f.manager.attach_driver(&id, f.units.clone()),
            Err(BatchError::Conflict { .. })
        ));
    }

    #[test]
    fn driver_needs_a_running_batch() {
        let mut f = fixture();
        let batch = f.manager.create("CAP1000", true, fast_params()).unwrap();
        assert!(matches!(
            f.manager.attach_driver(&batch.batch_id, f.units.clone()),
            Err(BatchError::NotRunning {
                status: BatchStatus::Pending,
                ..
            })
        ));
    }

    #[test]
    fn unit_sequence_must_cover_targets() {
        let mut f = fixture();
        let batch = f.manager.create("CAP1000", true, fast_params()).unwrap();
        let id = batch.batch_id;
        f.manager.start(&id, f.targets.clone(), &f.partition).unwrap();

        let mut short = f.units.clone();
        short.pop();
        assert!(matches!(
            f.manager.attach_driver(&id, short),
            Err(BatchError::UnitSequence { .. })
        ));

        let mut doubled = f.units.clone();
        let repeated = doubled[0].primary.clone();
        doubled[1] = DetectionUnit::single(1, repeated);
        assert!(matches!(
            f.manager.attach_driver(&id, doubled),
            Err(BatchError::UnitSequence { .. })
        ));
        assert!(!f.manager.has_driver(&id));
    }

    #[test]
    fn partition_must_match_targets() {
        let mut f = fixture();
        let batch = f.manager.create("CAP1000", true, fast_params()).unwrap();
        let mut fewer = f.targets.clone();
        fewer.pop();
        assert!(matches!(
            f.manager.start(&batch.batch_id, fewer, &f.partition),
            Err(BatchError::TargetSet { .. })
        ));
    }

    #[test]
    fn ticking_to_the_end_completes_the_batch() {
        let mut f = fixture();
        let id = running(&mut f);

        let mut summary = None;
        for _ in 0..1_000 {
            if let BatchTick::Completed(s) = f.manager.tick(&id).unwrap() {
                summary = Some(s);
                break;
            }
        }
        let summary = summary.unwrap();
        assert_eq!(summary.total, 8);
        assert_eq!(summary.qualified, 8);
        assert!((summary.qualification_rate - 1.0).abs() < f64::EPSILON);
        let per_sector_total: u32 = summary.per_sector.values().map(|s| s.total).sum();
        assert_eq!(per_sector_total, 8);

        assert_eq!(f.manager.batch(&id).unwrap().status, BatchStatus::Completed);
        assert_eq!(f.manager.summary(&id), Some(&summary));
        assert_eq!(f.store.load_summary(&id).unwrap(), summary);
        assert_eq!(f.manager.tick(&id).unwrap(), BatchTick::Idle);
        assert!(matches!(
            f.recorder.events().last(),
            Some(InspectionEvent::BatchCompleted { .. })
        ));
    }

    #[test]
    fn complete_refuses_unfinished_batches() {
        let mut f = fixture();
        let id = running(&mut f);
        assert!(matches!(
            f.manager.complete(&id),
            Err(BatchError::Incomplete { remaining: 8, .. })
        ));
    }

    #[test]
    fn pause_is_idempotent_and_persists_progress() {
        let mut f = fixture();
        let id = running(&mut f);
        for _ in 0..4 {
            f.manager.tick(&id).unwrap();
        }
        f.manager.pause(&id).unwrap();
        f.manager.pause(&id).unwrap();

        let state = f.store.load_detection_state(&id).unwrap();
        assert_eq!(state.current_index, 1);
        assert_eq!(state.elapsed_ms_within_current_unit, 100);
        assert_eq!(state.detection_results.len(), f.units[0].hole_ids().count());
        assert_eq!(f.manager.tick(&id).unwrap(), BatchTick::Idle);

        let paused_events = f
            .recorder
            .events()
            .iter()
            .filter(|e| matches!(e, InspectionEvent::BatchPaused { .. }))
            .count();
        assert_eq!(paused_events, 1);
    }

    #[test]
    fn resume_restores_the_cursor() {
        let mut f = fixture();
        let id = running(&mut f);
        for _ in 0..4 {
            f.manager.tick(&id).unwrap();
        }
        f.manager.pause(&id).unwrap();

        let outcome = f.manager.resume(&id, RecoveryMode::Strict).unwrap();
        assert_eq!(outcome.current_index, 1);
        assert_eq!(outcome.elapsed_ms, 100);
        assert!(!outcome.restarted);
        assert_eq!(
            f.manager.cursor(&id),
            Some(DriverCursor {
                index: 1,
                elapsed_ms: 100
            })
        );
        let in_progress = f.units[1].primary.clone();
        assert_eq!(
            f.manager.target(&id, &in_progress).unwrap().status,
            HoleStatus::InProgress
        );

        let again = f.manager.resume(&id, RecoveryMode::Strict).unwrap();
        assert!(again.already_running);
    }

    #[test]
    fn strict_resume_fails_without_a_snapshot() {
        let mut f = fixture();
        let id = running(&mut f);
        f.manager.tick(&id).unwrap();
        f.manager.pause(&id).unwrap();
        f.store.remove(&id, SnapshotFile::DetectionState);

        assert!(matches!(
            f.manager.resume(&id, RecoveryMode::Strict),
            Err(BatchError::StateRecovery { .. })
        ));
        assert_eq!(f.manager.batch(&id).unwrap().status, BatchStatus::Paused);
    }

    #[test]
    fn lenient_resume_restarts_on_a_corrupt_snapshot() {
        let mut f = fixture();
        let id = running(&mut f);
        for _ in 0..7 {
            f.manager.tick(&id).unwrap();
        }
        f.manager.pause(&id).unwrap();
        f.store.put_raw(&id, SnapshotFile::DetectionState, "{\"current_index\": 3");

        let outcome = f.manager.resume(&id, RecoveryMode::Lenient).unwrap();
        assert!(outcome.restarted);
        assert_eq!(outcome.current_index, 0);
        let batch = f.manager.batch(&id).unwrap();
        assert_eq!(batch.status, BatchStatus::Running);
        assert!(batch.results.is_empty());
        assert!(f
            .manager
            .targets(&id)
            .all(|t| t.status == HoleStatus::Pending));
    }

    #[test]
    fn lenient_restart_announces_each_reset_hole() {
        let mut f = fixture();
        let id = running(&mut f);
        for _ in 0..7 {
            f.manager.tick(&id).unwrap();
        }
        f.manager.pause(&id).unwrap();
        let touched: Vec<HoleId> = f
            .manager
            .targets(&id)
            .filter(|t| t.status != HoleStatus::Pending)
            .map(|t| t.id.clone())
            .collect();
        assert!(!touched.is_empty());
        f.store.remove(&id, SnapshotFile::DetectionState);

        let seen = f.recorder.len();
        f.manager.resume(&id, RecoveryMode::Lenient).unwrap();
        let events = f.recorder.events().split_off(seen);

        let (resumed, resets) = events.split_last().unwrap();
        assert!(matches!(
            resumed,
            InspectionEvent::BatchResumed { restarted: true, .. }
        ));
        let reset_ids: Vec<HoleId> = resets
            .iter()
            .map(|e| match e {
                InspectionEvent::HoleStatusChanged {
                    hole_id,
                    status: HoleStatus::Pending,
                    ..
                } => hole_id.clone(),
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(reset_ids, touched);
    }

    #[test]
    fn snapshot_for_other_holes_is_rejected() {
        let mut f = fixture();
        let id = running(&mut f);
        f.manager.tick(&id).unwrap();
        f.manager.pause(&id).unwrap();

        let mut state = f.store.load_detection_state(&id).unwrap();
        state.pending_holes.push(HoleId::new("BC009R009"));
        f.store.save_detection_state(&id, &state).unwrap();

        assert!(matches!(
            f.manager.resume(&id, RecoveryMode::Strict),
            Err(BatchError::StateRecovery { .. })
        ));
    }

    #[test]
    fn terminate_errors_the_unit_in_progress() {
        let mut f = fixture();
        let id = running(&mut f);
        f.manager.tick(&id).unwrap();
        f.manager.terminate(&id, "operator abort").unwrap();

        let batch = f.manager.batch(&id).unwrap();
        assert_eq!(batch.status, BatchStatus::Terminated);
        for hole in f.units[0].hole_ids() {
            assert_eq!(f.manager.target(&id, hole).unwrap().status, HoleStatus::Error);
        }
        for hole in f.units[1].hole_ids() {
            assert_eq!(f.manager.target(&id, hole).unwrap().status, HoleStatus::Pending);
        }
        assert!(!f.manager.has_driver(&id));
        assert!(matches!(
            f.recorder.events().last(),
            Some(InspectionEvent::BatchTerminated { reason, .. }) if reason == "operator abort"
        ));

        assert!(matches!(
            f.manager.terminate(&id, "again"),
            Err(BatchError::InvalidTransition { .. })
        ));
        assert!(f.manager.create("CAP1000", true, fast_params()).is_ok());
    }

    #[test]
    fn pending_and_paused_batches_can_be_terminated() {
        let mut f = fixture();
        let pending = f.manager.create("VLV20", true, fast_params()).unwrap();
        f.manager.terminate(&pending.batch_id, "cancelled").unwrap();

        let id = running(&mut f);
        f.manager.pause(&id).unwrap();
        f.manager.terminate(&id, "cancelled").unwrap();
        assert_eq!(f.manager.batch(&id).unwrap().status, BatchStatus::Terminated);
    }

    #[test]
    fn unknown_batches_are_reported() {
        let mut f = fixture();
        let ghost = BatchId::new("ghost");
        assert!(matches!(
            f.manager.tick(&ghost),
            Err(BatchError::UnknownBatch { .. })
        ));
        assert!(f.manager.batch(&ghost).is_none());
    }

    #[test]
    fn recover_reloads_a_paused_batch() {
        let mut f = fixture();
        let id = running(&mut f);
        for _ in 0..5 {
            f.manager.tick(&id).unwrap();
        }
        f.manager.pause(&id).unwrap();

        let events = EventPublisher::new();
        let mut restarted =
            BatchLifecycleManager::new(Arc::clone(&f.store) as Arc<dyn SnapshotStore>, events);
        restarted
            .recover(&id, f.targets.clone(), &f.partition, f.units.clone())
            .unwrap();
        assert_eq!(restarted.batch(&id).unwrap().status, BatchStatus::Paused);
        assert_eq!(restarted.batch(&id).unwrap().simulation_params, fast_params());

        let outcome = restarted.resume(&id, RecoveryMode::Strict).unwrap();
        assert_eq!(outcome.current_index, 1);
        assert_eq!(outcome.elapsed_ms, 200);
        assert!(restarted.has_driver(&id));

        let next = restarted.create("CAP1000", true, fast_params());
        assert!(matches!(next, Err(BatchError::Conflict { .. })));
    }

    #[test]
    fn recover_needs_batch_info() {
        let mut f = fixture();
        assert!(matches!(
            f.manager.recover(
                &BatchId::new("never-written"),
                f.targets.clone(),
                &f.partition,
                f.units.clone()
            ),
            Err(BatchError::StateRecovery { .. })
        ));
    }
}
