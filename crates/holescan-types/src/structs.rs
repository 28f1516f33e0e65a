//! Core entity structs: targets, detection units, and batch summaries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{HoleStatus, SectorId, Side};
use crate::ids::{BatchId, HoleId};

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

/// A target record as supplied by the geometry provider.
///
/// This is the flat input format; it carries no inspection state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    /// Structured hole identifier.
    pub id: HoleId,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Hole diameter.
    pub diameter: f64,
    /// Logical side group.
    pub side_label: Side,
}

impl TargetRecord {
    /// Convert the record into a live target with [`HoleStatus::Pending`].
    pub fn into_target(self) -> Target {
        Target {
            id: self.id,
            x: self.x,
            y: self.y,
            diameter: self.diameter,
            side_label: self.side_label,
            status: HoleStatus::Pending,
        }
    }
}

/// A single inspection target ("hole") with its live status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Structured hole identifier.
    pub id: HoleId,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Hole diameter.
    pub diameter: f64,
    /// Logical side group.
    pub side_label: Side,
    /// Current inspection status.
    pub status: HoleStatus,
}

impl Target {
    /// Create a pending target.
    pub fn new(id: impl Into<HoleId>, x: f64, y: f64, diameter: f64, side_label: Side) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            diameter,
            side_label,
            status: HoleStatus::Pending,
        }
    }
}

// ---------------------------------------------------------------------------
// Detection units
// ---------------------------------------------------------------------------

/// One traversal step: a single hole, or a pair inspected simultaneously
/// by the two probes of the inspection head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionUnit {
    /// Position of this unit in the ordered sequence.
    pub index: usize,
    /// The hole under the leading probe.
    pub primary: HoleId,
    /// The hole under the trailing probe, when the unit is a pair.
    pub partner: Option<HoleId>,
}

impl DetectionUnit {
    /// Create a single-hole unit.
    pub const fn single(index: usize, primary: HoleId) -> Self {
        Self {
            index,
            primary,
            partner: None,
        }
    }

    /// Create a two-hole unit.
    pub const fn pair(index: usize, primary: HoleId, partner: HoleId) -> Self {
        Self {
            index,
            primary,
            partner: Some(partner),
        }
    }

    /// Whether two probes operate in this unit.
    pub const fn is_pair(&self) -> bool {
        self.partner.is_some()
    }

    /// Iterate over the holes of this unit, primary first.
    pub fn hole_ids(&self) -> impl Iterator<Item = &HoleId> {
        core::iter::once(&self.primary).chain(self.partner.as_ref())
    }
}

/// Final outcome assigned to one hole of a finalized unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoleOutcome {
    /// The inspected hole.
    pub hole_id: HoleId,
    /// The status it finalized with.
    pub status: HoleStatus,
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

/// Aggregate counts for one sector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorSummary {
    /// Holes assigned to the sector.
    pub total: u32,
    /// Holes that finalized as qualified.
    pub qualified: u32,
    /// Holes that finalized as defective.
    pub defective: u32,
    /// Holes with any final status.
    pub completed: u32,
}

impl SectorSummary {
    /// Count one hole with the given status.
    pub const fn record(&mut self, status: HoleStatus) {
        self.total = self.total.saturating_add(1);
        match status {
            HoleStatus::Qualified => self.qualified = self.qualified.saturating_add(1),
            HoleStatus::Defective => self.defective = self.defective.saturating_add(1),
            _ => {}
        }
        if status.is_final() {
            self.completed = self.completed.saturating_add(1);
        }
    }
}

/// Summary written when a batch completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// The batch this summary belongs to.
    pub batch_id: BatchId,
    /// Total holes in the batch.
    pub total: u32,
    /// Holes that finalized as qualified.
    pub qualified: u32,
    /// Holes that finalized as defective.
    pub defective: u32,
    /// Holes that finalized as blind.
    pub blind: u32,
    /// Holes whose outcome needs manual review.
    pub uncertain: u32,
    /// Holes left in an error state.
    pub error: u32,
    /// `qualified / total`, or 0 for an empty batch.
    pub qualification_rate: f64,
    /// Per-sector aggregate counts.
    pub per_sector: BTreeMap<SectorId, SectorSummary>,
    /// When the summary was computed.
    pub completed_at: DateTime<Utc>,
}

impl BatchSummary {
    /// Build a summary from each hole's sector and final status.
    pub fn from_statuses(
        batch_id: BatchId,
        holes: impl IntoIterator<Item = (SectorId, HoleStatus)>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let mut per_sector: BTreeMap<SectorId, SectorSummary> =
            SectorId::ALL.iter().map(|s| (*s, SectorSummary::default())).collect();
        let mut summary = Self {
            batch_id,
            total: 0,
            qualified: 0,
            defective: 0,
            blind: 0,
            uncertain: 0,
            error: 0,
            qualification_rate: 0.0,
            per_sector: BTreeMap::new(),
            completed_at,
        };

        for (sector, status) in holes {
            summary.total = summary.total.saturating_add(1);
            let counter = match status {
                HoleStatus::Qualified => Some(&mut summary.qualified),
                HoleStatus::Defective => Some(&mut summary.defective),
                HoleStatus::Blind => Some(&mut summary.blind),
                HoleStatus::Uncertain => Some(&mut summary.uncertain),
                HoleStatus::Error => Some(&mut summary.error),
                HoleStatus::Pending | HoleStatus::InProgress => None,
            };
            if let Some(count) = counter {
                *count = count.saturating_add(1);
            }
            per_sector.entry(sector).or_default().record(status);
        }

        if summary.total > 0 {
            summary.qualification_rate = f64::from(summary.qualified) / f64::from(summary.total);
        }
        summary.per_sector = per_sector;
        summary
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unit_iterates_primary_then_partner() {
        let unit = DetectionUnit::pair(0, HoleId::new("AC001R001"), HoleId::new("AC005R001"));
        let ids: Vec<&str> = unit.hole_ids().map(HoleId::as_str).collect();
        assert_eq!(ids, vec!["AC001R001", "AC005R001"]);
        assert!(unit.is_pair());

        let single = DetectionUnit::single(1, HoleId::new("AC002R003"));
        assert_eq!(single.hole_ids().count(), 1);
        assert!(!single.is_pair());
    }

    #[test]
    fn summary_counts_per_sector() {
        let holes = vec![
            (SectorId::One, HoleStatus::Qualified),
            (SectorId::One, HoleStatus::Defective),
            (SectorId::Two, HoleStatus::Qualified),
            (SectorId::Four, HoleStatus::Pending),
        ];
        let summary = BatchSummary::from_statuses(BatchId::new("b"), holes, Utc::now());

        assert_eq!(summary.total, 4);
        assert_eq!(summary.qualified, 2);
        assert_eq!(summary.defective, 1);
        assert!((summary.qualification_rate - 0.5).abs() < f64::EPSILON);

        let one = summary.per_sector.get(&SectorId::One).unwrap();
        assert_eq!((one.total, one.qualified, one.defective, one.completed), (2, 1, 1, 2));
        let three = summary.per_sector.get(&SectorId::Three).unwrap();
        assert_eq!(three.total, 0);
        let four = summary.per_sector.get(&SectorId::Four).unwrap();
        assert_eq!((four.total, four.completed), (1, 0));
    }

    #[test]
    fn summary_round_trips_through_json() {
        let summary = BatchSummary::from_statuses(
            BatchId::new("b"),
            vec![(SectorId::Three, HoleStatus::Blind)],
            Utc::now(),
        );
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"sector_3\""));
        let back: BatchSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }

    #[test]
    fn record_converts_to_pending_target() {
        let record = TargetRecord {
            id: HoleId::new("BC002R004"),
            x: 1.0,
            y: -2.0,
            diameter: 0.5,
            side_label: Side::B,
        };
        let target = record.into_target();
        assert_eq!(target.status, HoleStatus::Pending);
        assert_eq!(target.side_label, Side::B);
    }
}
