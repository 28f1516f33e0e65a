//! The detection driver: walks the unit sequence one tick at a time.
//!
//! A unit's phase is derived from the cursor `(index, elapsed_ms)` alone:
//!
//! | elapsed before the tick | effect of the tick                          |
//! |-------------------------|---------------------------------------------|
//! | `0`                     | unit starts, its holes become `InProgress`  |
//! | crosses `reveal_offset` | outcomes are sampled and become final       |
//! | reaches `unit_dwell`    | unit finalized, cursor moves to next unit   |
//!
//! Persisting the cursor is therefore enough to resume a unit mid-dwell.
//! The driver never owns batch state; it reads and writes it through an
//! [`InspectionLedger`] supplied by the lifecycle manager on every tick.

use holescan_types::{
    BatchId, DetectionUnit, DriverId, HoleId, HoleOutcome, HoleStatus, InspectionEvent,
    SimulationParams,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::sampler::OutcomeSampler;

/// Mutable view of a batch handed to the driver for one tick.
pub trait InspectionLedger {
    /// The batch being inspected.
    fn batch_id(&self) -> &BatchId;

    /// Current status of a hole, or `None` if it is not in the batch.
    fn status_of(&self, hole: &HoleId) -> Option<HoleStatus>;

    /// Change a hole's status. Returns `false` if the hole is unknown.
    fn set_status(&mut self, hole: &HoleId, status: HoleStatus) -> bool;

    /// Record the index of the unit now in progress.
    fn set_current_index(&mut self, index: usize);

    /// Emit an event to external consumers.
    fn publish(&self, event: InspectionEvent);
}

/// Position of the driver within the unit sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverCursor {
    /// Index of the unit in progress.
    pub index: usize,
    /// Simulated time already spent on that unit.
    pub elapsed_ms: u64,
}

/// What a tick accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverTick {
    /// More units remain.
    Advanced,
    /// The last unit has been finalized.
    Finished,
}

/// Drives one batch through its unit sequence.
#[derive(Debug, Clone)]
pub struct DetectionDriver {
    id: DriverId,
    units: Vec<DetectionUnit>,
    params: SimulationParams,
    sampler: OutcomeSampler,
    cursor: DriverCursor,
}

impl DetectionDriver {
    /// Create a driver positioned at the first unit.
    pub fn new(units: Vec<DetectionUnit>, params: SimulationParams) -> Self {
        Self::with_cursor(units, params, DriverCursor::default())
    }

    /// Create a driver positioned at a persisted cursor.
    pub fn with_cursor(
        units: Vec<DetectionUnit>,
        params: SimulationParams,
        cursor: DriverCursor,
    ) -> Self {
        Self {
            id: DriverId::new(),
            units,
            sampler: OutcomeSampler::new(&params),
            params,
            cursor,
        }
    }

    /// This driver's identity.
    pub const fn id(&self) -> DriverId {
        self.id
    }

    /// Current position.
    pub const fn cursor(&self) -> DriverCursor {
        self.cursor
    }

    /// The full unit sequence.
    pub fn units(&self) -> &[DetectionUnit] {
        &self.units
    }

    /// Length of the unit sequence.
    pub fn total_units(&self) -> usize {
        self.units.len()
    }

    /// The unit in progress, if any remain.
    pub fn current_unit(&self) -> Option<&DetectionUnit> {
        self.units.get(self.cursor.index)
    }

    /// Whether every unit has been finalized.
    pub fn is_finished(&self) -> bool {
        self.cursor.index >= self.units.len()
    }

    /// Advance simulated time by one tick interval.
    pub fn tick(&mut self, ledger: &mut dyn InspectionLedger) -> DriverTick {
        let Some(unit) = self.current_unit().cloned() else {
            return DriverTick::Finished;
        };

        if self.cursor.elapsed_ms == 0 && !self.begin_unit(&unit, ledger) {
            self.skip_unit(&unit, ledger);
            return self.tick_result();
        }

        let before = self.cursor.elapsed_ms;
        let after = before.saturating_add(self.params.tick_interval_ms);
        self.cursor.elapsed_ms = after;

        if !self.is_revealed(before) && self.is_revealed(after) {
            self.reveal(&unit, ledger);
        }
        if after >= self.params.unit_dwell_ms {
            self.finalize(&unit, ledger);
        }

        self.tick_result()
    }

    fn tick_result(&self) -> DriverTick {
        if self.is_finished() {
            DriverTick::Finished
        } else {
            DriverTick::Advanced
        }
    }

    /// Whether a unit with this much elapsed time has its outcome.
    const fn is_revealed(&self, elapsed_ms: u64) -> bool {
        elapsed_ms > 0 && elapsed_ms >= self.params.reveal_offset_ms
    }

    /// Start a unit. Returns `false` if it references an unknown hole.
    fn begin_unit(&self, unit: &DetectionUnit, ledger: &mut dyn InspectionLedger) -> bool {
        if let Some(missing) = unit.hole_ids().find(|id| ledger.status_of(id).is_none()) {
            warn!(
                batch_id = %ledger.batch_id(),
                index = unit.index,
                hole_id = %missing,
                "Unit references a hole missing from the batch, skipping"
            );
            return false;
        }

        let batch_id = ledger.batch_id().clone();
        ledger.publish(InspectionEvent::UnitStarted {
            batch_id: batch_id.clone(),
            unit: unit.clone(),
        });
        for hole_id in unit.hole_ids() {
            ledger.set_status(hole_id, HoleStatus::InProgress);
            ledger.publish(InspectionEvent::HoleStatusChanged {
                batch_id: batch_id.clone(),
                hole_id: hole_id.clone(),
                status: HoleStatus::InProgress,
            });
        }
        debug!(batch_id = %batch_id, index = unit.index, pair = unit.is_pair(), "Unit started");
        true
    }

    fn reveal(&self, unit: &DetectionUnit, ledger: &mut dyn InspectionLedger) {
        let batch_id = ledger.batch_id().clone();
        for outcome in self.sampler.sample_unit(unit) {
            if ledger.set_status(&outcome.hole_id, outcome.status) {
                ledger.publish(InspectionEvent::HoleStatusChanged {
                    batch_id: batch_id.clone(),
                    hole_id: outcome.hole_id,
                    status: outcome.status,
                });
            }
        }
        debug!(batch_id = %batch_id, index = unit.index, "Unit outcome revealed");
    }

    fn finalize(&mut self, unit: &DetectionUnit, ledger: &mut dyn InspectionLedger) {
        let outcomes: Vec<HoleOutcome> = unit
            .hole_ids()
            .filter_map(|id| {
                ledger.status_of(id).map(|status| HoleOutcome {
                    hole_id: id.clone(),
                    status,
                })
            })
            .collect();
        ledger.publish(InspectionEvent::UnitFinalized {
            batch_id: ledger.batch_id().clone(),
            unit: unit.clone(),
            outcomes,
        });
        self.advance(ledger);
    }

    /// Mark whatever is known of a broken unit as errored and move on.
    fn skip_unit(&mut self, unit: &DetectionUnit, ledger: &mut dyn InspectionLedger) {
        let batch_id = ledger.batch_id().clone();
        for hole_id in unit.hole_ids() {
            let known_unfinished = ledger.status_of(hole_id).is_some_and(|s| !s.is_final());
            if known_unfinished && ledger.set_status(hole_id, HoleStatus::Error) {
                ledger.publish(InspectionEvent::HoleStatusChanged {
                    batch_id: batch_id.clone(),
                    hole_id: hole_id.clone(),
                    status: HoleStatus::Error,
                });
            }
        }
        self.advance(ledger);
    }

    fn advance(&mut self, ledger: &mut dyn InspectionLedger) {
        self.cursor.index = self.cursor.index.saturating_add(1);
        self.cursor.elapsed_ms = 0;
        ledger.set_current_index(self.cursor.index);
        ledger.publish(InspectionEvent::BatchProgress {
            batch_id: ledger.batch_id().clone(),
            current_index: self.cursor.index,
            total_units: self.units.len(),
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    /// In-memory ledger recording every event.
    struct TestLedger {
        batch_id: BatchId,
        statuses: BTreeMap<HoleId, HoleStatus>,
        current_index: usize,
    }

    impl TestLedger {
        fn with_holes(ids: &[&str]) -> Self {
            Self {
                batch_id: BatchId::new("b1"),
                statuses: ids
                    .iter()
                    .map(|id| (HoleId::new(*id), HoleStatus::Pending))
                    .collect(),
                current_index: 0,
            }
        }

        fn status(&self, id: &str) -> HoleStatus {
            self.statuses[&HoleId::new(id)]
        }
    }

    impl InspectionLedger for TestLedger {
        fn batch_id(&self) -> &BatchId {
            &self.batch_id
        }

        fn status_of(&self, hole: &HoleId) -> Option<HoleStatus> {
            self.statuses.get(hole).copied()
        }

        fn set_status(&mut self, hole: &HoleId, status: HoleStatus) -> bool {
            match self.statuses.get_mut(hole) {
                Some(slot) => {
                    *slot = status;
                    true
                }
                None => false,
            }
        }

        fn set_current_index(&mut self, index: usize) {
            self.current_index = index;
        }

        fn publish(&self, _event: InspectionEvent) {}
    }

    /// Ledger wrapper that keeps events, since `publish` takes `&self`.
    struct RecordingLedger {
        inner: TestLedger,
        events: std::cell::RefCell<Vec<InspectionEvent>>,
    }

    impl InspectionLedger for RecordingLedger {
        fn batch_id(&self) -> &BatchId {
            self.inner.batch_id()
        }

        fn status_of(&self, hole: &HoleId) -> Option<HoleStatus> {
            self.inner.status_of(hole)
        }

        fn set_status(&mut self, hole: &HoleId, status: HoleStatus) -> bool {
            self.inner.set_status(hole, status)
        }

        fn set_current_index(&mut self, index: usize) {
            self.inner.set_current_index(index);
        }

        fn publish(&self, event: InspectionEvent) {
            self.events.borrow_mut().push(event);
        }
    }

    fn params() -> SimulationParams {
        SimulationParams {
            tick_interval_ms: 100,
            unit_dwell_ms: 1_000,
            reveal_offset_ms: 500,
            qualified_rate: 1.0,
            defective_rate: 0.0,
            blind_rate: 0.0,
            seed: 1,
        }
    }

    fn two_units() -> Vec<DetectionUnit> {
        vec![
            DetectionUnit::pair(0, HoleId::new("AC001R001"), HoleId::new("AC005R001")),
            DetectionUnit::single(1, HoleId::new("AC002R001")),
        ]
    }

    #[test]
    fn unit_phases_follow_elapsed_time() {
        let mut ledger = TestLedger::with_holes(&["AC001R001", "AC005R001", "AC002R001"]);
        let mut driver = DetectionDriver::new(two_units(), params());

        assert_eq!(driver.tick(&mut ledger), DriverTick::Advanced);
        assert_eq!(ledger.status("AC001R001"), HoleStatus::InProgress);
        assert_eq!(ledger.status("AC005R001"), HoleStatus::InProgress);
        assert_eq!(driver.cursor().elapsed_ms, 100);

        for _ in 0..3 {
            driver.tick(&mut ledger);
        }
        assert_eq!(ledger.status("AC001R001"), HoleStatus::InProgress);

        driver.tick(&mut ledger);
        assert_eq!(driver.cursor().elapsed_ms, 500);
        assert_eq!(ledger.status("AC001R001"), HoleStatus::Qualified);
        assert_eq!(ledger.status("AC002R001"), HoleStatus::Pending);

        for _ in 0..5 {
            driver.tick(&mut ledger);
        }
        assert_eq!(driver.cursor(), DriverCursor { index: 1, elapsed_ms: 0 });
        assert_eq!(ledger.current_index, 1);
        assert_eq!(ledger.status("AC002R001"), HoleStatus::Pending);

        for _ in 0..9 {
            assert_eq!(driver.tick(&mut ledger), DriverTick::Advanced);
        }
        assert_eq!(driver.tick(&mut ledger), DriverTick::Finished);
        assert_eq!(ledger.status("AC002R001"), HoleStatus::Qualified);
        assert!(driver.is_finished());
    }

    #[test]
    fn events_are_emitted_in_order() {
        let mut ledger = RecordingLedger {
            inner: TestLedger::with_holes(&["AC002R001"]),
            events: std::cell::RefCell::default(),
        };
        let units = vec![DetectionUnit::single(0, HoleId::new("AC002R001"))];
        let mut driver = DetectionDriver::new(units, params());
        while driver.tick(&mut ledger) == DriverTick::Advanced {}

        let names: Vec<&'static str> = ledger
            .events
            .borrow()
            .iter()
            .map(|e| match e {
                InspectionEvent::UnitStarted { .. } => "unit_started",
                InspectionEvent::HoleStatusChanged { .. } => "hole_status_changed",
                InspectionEvent::UnitFinalized { .. } => "unit_finalized",
                InspectionEvent::BatchProgress { .. } => "batch_progress",
                _ => "other",
            })
            .collect();
        assert_eq!(
            names,
            vec![
                "unit_started",
                "hole_status_changed",
                "hole_status_changed",
                "unit_finalized",
                "batch_progress",
            ]
        );
    }

    #[test]
    fn resuming_mid_unit_does_not_restart_it() {
        let mut ledger = TestLedger::with_holes(&["AC001R001", "AC005R001", "AC002R001"]);
        ledger.set_status(&HoleId::new("AC001R001"), HoleStatus::InProgress);
        ledger.set_status(&HoleId::new("AC005R001"), HoleStatus::InProgress);

        let cursor = DriverCursor {
            index: 0,
            elapsed_ms: 400,
        };
        let mut driver = DetectionDriver::with_cursor(two_units(), params(), cursor);
        driver.tick(&mut ledger);

        assert_eq!(driver.cursor().elapsed_ms, 500);
        assert_eq!(ledger.status("AC001R001"), HoleStatus::Qualified);
        assert_eq!(ledger.status("AC005R001"), HoleStatus::Qualified);
    }

    #[test]
    fn unknown_hole_skips_the_unit() {
        let mut ledger = TestLedger::with_holes(&["AC001R001", "AC002R001"]);
        let mut driver = DetectionDriver::new(two_units(), params());

        assert_eq!(driver.tick(&mut ledger), DriverTick::Advanced);
        assert_eq!(driver.cursor(), DriverCursor { index: 1, elapsed_ms: 0 });
        assert_eq!(ledger.status("AC001R001"), HoleStatus::Error);

        driver.tick(&mut ledger);
        assert_eq!(ledger.status("AC002R001"), HoleStatus::InProgress);
    }

    #[test]
    fn long_ticks_collapse_phases() {
        let mut ledger = TestLedger::with_holes(&["AC002R001"]);
        let units = vec![DetectionUnit::single(0, HoleId::new("AC002R001"))];
        let coarse = SimulationParams {
            tick_interval_ms: 5_000,
            ..params()
        };
        let mut driver = DetectionDriver::new(units, coarse);
        assert_eq!(driver.tick(&mut ledger), DriverTick::Finished);
        assert_eq!(ledger.status("AC002R001"), HoleStatus::Qualified);
    }

    #[test]
    fn exhausted_driver_reports_finished() {
        let mut ledger = TestLedger::with_holes(&[]);
        let mut driver = DetectionDriver::new(Vec::new(), params());
        assert_eq!(driver.tick(&mut ledger), DriverTick::Finished);
    }
}
