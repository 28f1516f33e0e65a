//! Angular sector partitioning around the workpiece center.
//!
//! The reference center is the center of the targets' bounding box, not
//! the coordinate average.
//!
//! Each target is classified by the angle of the vector from the center to
//! the target, normalized to `[0, 360)`, into four closed-open quarter
//! turns (see [`SectorId`]). Whether the vertical axis points up
//! (mathematical convention) or down (screen convention) is an explicit
//! [`AxisOrientation`] choice rather than an assumption baked into the
//! angle formula.

use std::collections::BTreeMap;

use holescan_types::{HoleId, HoleStatus, SectorId, SectorSummary, Side, Target};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::PartitionError;

/// Orientation of the vertical coordinate axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisOrientation {
    /// Y grows upward; angles run counter-clockwise on screen.
    #[default]
    MathYUp,
    /// Y grows downward (image/screen coordinates); the vertical offset is
    /// inverted before the angle is taken.
    ScreenYDown,
}

/// A point in workpiece coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

/// One angular sector and the holes assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sector {
    /// Which quarter turn this is.
    pub id: SectorId,
    /// Holes in the sector, sorted by id.
    pub hole_ids: Vec<HoleId>,
}

impl Sector {
    /// Inclusive start of the angular range, in degrees.
    pub const fn start_deg(&self) -> f64 {
        self.id.start_deg()
    }

    /// Exclusive end of the angular range, in degrees.
    pub const fn end_deg(&self) -> f64 {
        self.id.end_deg()
    }

    /// Aggregate counts for the sector given each hole's current status.
    ///
    /// Holes missing from `status_of` are counted as pending.
    pub fn summarize<F>(&self, status_of: F) -> SectorSummary
    where
        F: Fn(&HoleId) -> Option<HoleStatus>,
    {
        let mut summary = SectorSummary::default();
        for id in &self.hole_ids {
            summary.record(status_of(id).unwrap_or(HoleStatus::Pending));
        }
        summary
    }
}

/// The result of partitioning a target set.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    center: Point,
    orientation: AxisOrientation,
    sectors: Vec<Sector>,
    assignment: BTreeMap<HoleId, SectorId>,
}

impl Partition {
    /// The bounding-box center used as the angular origin.
    pub const fn center(&self) -> Point {
        self.center
    }

    /// The axis orientation the partition was computed with.
    pub const fn orientation(&self) -> AxisOrientation {
        self.orientation
    }

    /// The four sectors in ascending angular order.
    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    /// Look up a single sector.
    pub fn sector(&self, id: SectorId) -> Option<&Sector> {
        self.sectors.iter().find(|s| s.id == id)
    }

    /// The sector a hole was assigned to.
    pub fn sector_of(&self, hole: &HoleId) -> Option<SectorId> {
        self.assignment.get(hole).copied()
    }

    /// Iterate over every `(hole, sector)` assignment in id order.
    pub fn assignments(&self) -> impl Iterator<Item = (&HoleId, SectorId)> {
        self.assignment.iter().map(|(id, s)| (id, *s))
    }

    /// Number of partitioned holes.
    pub fn len(&self) -> usize {
        self.assignment.len()
    }

    /// Whether the partition is empty. Always false for a partition built
    /// by [`GeometryPartitioner::partition`].
    pub fn is_empty(&self) -> bool {
        self.assignment.is_empty()
    }

    /// Check that the sectors cover exactly the given ids: every id is in
    /// exactly one sector and no sector holds an id outside the set.
    pub fn covers_exactly<'a>(&self, ids: impl IntoIterator<Item = &'a HoleId>) -> bool {
        let mut expected: Vec<&HoleId> = ids.into_iter().collect();
        expected.sort_unstable();
        expected.dedup();

        let mut seen: Vec<&HoleId> = self.sectors.iter().flat_map(|s| s.hole_ids.iter()).collect();
        seen.sort_unstable();
        seen == expected
    }
}

/// Computes the reference center and assigns targets to sectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeometryPartitioner {
    orientation: AxisOrientation,
}

impl GeometryPartitioner {
    /// Create a partitioner for the given axis orientation.
    pub const fn new(orientation: AxisOrientation) -> Self {
        Self { orientation }
    }

    /// The configured axis orientation.
    pub const fn orientation(&self) -> AxisOrientation {
        self.orientation
    }

    /// Compute the center of the targets' bounding box.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::EmptyTargets`] for an empty slice and
    /// [`PartitionError::NonFiniteCoordinate`] if any coordinate is NaN or
    /// infinite.
    pub fn reference_center(&self, targets: &[Target]) -> Result<Point, PartitionError> {
        let Some(first) = targets.first() else {
            return Err(PartitionError::EmptyTargets);
        };

        let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
        for t in targets {
            if !t.x.is_finite() || !t.y.is_finite() {
                return Err(PartitionError::NonFiniteCoordinate {
                    id: t.id.clone(),
                    x: t.x,
                    y: t.y,
                });
            }
            min_x = min_x.min(t.x);
            max_x = max_x.max(t.x);
            min_y = min_y.min(t.y);
            max_y = max_y.max(t.y);
        }

        // Halve before adding so extreme coordinates cannot overflow.
        Ok(Point {
            x: min_x / 2.0 + max_x / 2.0,
            y: min_y / 2.0 + max_y / 2.0,
        })
    }

    /// Angle in degrees of the vector from the center to `(x, y)`,
    /// normalized to `[0, 360)` under the configured orientation.
    pub fn angle_deg(&self, x: f64, y: f64, center_x: f64, center_y: f64) -> f64 {
        let dx = x - center_x;
        let dy = match self.orientation {
            AxisOrientation::MathYUp => y - center_y,
            AxisOrientation::ScreenYDown => center_y - y,
        };
        let angle = dy.atan2(dx).to_degrees().rem_euclid(360.0);
        if angle >= 360.0 { 0.0 } else { angle }
    }

    /// Classify a raw point against a center without building a partition.
    ///
    /// Returns `None` only for non-finite input.
    pub fn classify_point(&self, x: f64, y: f64, center_x: f64, center_y: f64) -> Option<SectorId> {
        SectorId::from_angle(self.angle_deg(x, y, center_x, center_y))
    }

    /// Side group for a point: non-negative vertical offset from the center
    /// (in the configured orientation) is side A, negative is side B.
    pub fn side_of(&self, y: f64, center: Point) -> Side {
        let offset = match self.orientation {
            AxisOrientation::MathYUp => y - center.y,
            AxisOrientation::ScreenYDown => center.y - y,
        };
        Side::from_offset(offset)
    }

    /// Partition the full target list into four sectors.
    ///
    /// A target sitting exactly on the center has angle 0 and falls into
    /// sector 1, unless every target does.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::EmptyTargets`] for an empty list,
    /// [`PartitionError::NonFiniteCoordinate`] for NaN/infinite input, and
    /// [`PartitionError::DegenerateGeometry`] when all targets coincide
    /// with the center.
    pub fn partition(&self, targets: &[Target]) -> Result<Partition, PartitionError> {
        let center = self.reference_center(targets)?;

        if targets
            .iter()
            .all(|t| t.x - center.x == 0.0 && t.y - center.y == 0.0)
        {
            return Err(PartitionError::DegenerateGeometry {
                count: targets.len(),
                x: center.x,
                y: center.y,
            });
        }

        let mut buckets: BTreeMap<SectorId, Vec<HoleId>> =
            SectorId::ALL.iter().map(|s| (*s, Vec::new())).collect();
        let mut assignment = BTreeMap::new();

        for t in targets {
            let Some(sector) = self.classify_point(t.x, t.y, center.x, center.y) else {
                warn!(hole = %t.id, x = t.x, y = t.y, "Target could not be classified into a sector");
                continue;
            };
            if assignment.insert(t.id.clone(), sector).is_some() {
                debug!(hole = %t.id, "Duplicate hole id during partitioning, keeping last sector");
                continue;
            }
            if let Some(bucket) = buckets.get_mut(&sector) {
                bucket.push(t.id.clone());
            }
        }

        // Duplicates can leave a stale id in an earlier bucket; rebuild from
        // the final assignment so every id lives in exactly one sector.
        if assignment.len() != targets.len() {
            for bucket in buckets.values_mut() {
                bucket.clear();
            }
            for (id, sector) in &assignment {
                if let Some(bucket) = buckets.get_mut(sector) {
                    bucket.push(id.clone());
                }
            }
        }

        let sectors: Vec<Sector> = buckets
            .into_iter()
            .map(|(id, mut hole_ids)| {
                hole_ids.sort_unstable();
                Sector { id, hole_ids }
            })
            .collect();

        info!(
            targets = targets.len(),
            center_x = center.x,
            center_y = center.y,
            orientation = ?self.orientation,
            sector_1 = sectors.first().map_or(0, |s| s.hole_ids.len()),
            sector_2 = sectors.get(1).map_or(0, |s| s.hole_ids.len()),
            sector_3 = sectors.get(2).map_or(0, |s| s.hole_ids.len()),
            sector_4 = sectors.get(3).map_or(0, |s| s.hole_ids.len()),
            "Targets partitioned into sectors"
        );

        Ok(Partition {
            center,
            orientation: self.orientation,
            sectors,
            assignment,
        })
    }
}
