//! Snake-path planning: the deterministic order in which holes are probed.
//!
//! The inspection head carries two probes a fixed number of columns apart.
//! The planner walks each side column by column (side A first), zig-zagging
//! through the rows so the head never jumps back to the start of a column:
//! odd-numbered columns are walked with ascending rows, even-numbered
//! columns with descending rows. While walking column `c`, the hole at
//! `(c + PAIR_COLUMN_INTERVAL, row)` rides along under the second probe
//! when it exists and has not been inspected yet; otherwise the hole is
//! inspected alone.
//!
//! The output depends only on the ids and side labels of the input, never
//! on input order, so a batch resumed from a snapshot sees exactly the same
//! sequence it was paused on.

use std::collections::{BTreeMap, BTreeSet};

use holescan_types::{DetectionUnit, HoleId, Side, Target};
use tracing::info;

use crate::error::PathGenerationError;

/// Column distance between the two probes of the inspection head.
pub const PAIR_COLUMN_INTERVAL: u32 = 4;

/// Rows of one column, keyed by row number.
type Column = BTreeMap<u32, HoleId>;

/// Columns of one side, keyed by column number.
type SideGrid = BTreeMap<u32, Column>;

/// Counts describing a planned sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathStats {
    /// Number of detection units.
    pub units: usize,
    /// Units inspecting two holes.
    pub pairs: usize,
    /// Units inspecting one hole.
    pub singles: usize,
}

impl PathStats {
    /// Count the units of a planned sequence.
    pub fn of(units: &[DetectionUnit]) -> Self {
        let pairs = units.iter().filter(|u| u.is_pair()).count();
        Self {
            units: units.len(),
            pairs,
            singles: units.len().saturating_sub(pairs),
        }
    }

    /// Number of holes covered by the sequence.
    pub const fn holes(&self) -> usize {
        self.singles.saturating_add(self.pairs.saturating_mul(2))
    }
}

/// Plans the snake traversal over a labelled target set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathPlanner;

impl PathPlanner {
    /// Create a planner.
    pub const fn new() -> Self {
        Self
    }

    /// Produce the ordered detection-unit sequence.
    ///
    /// # Errors
    ///
    /// Returns [`PathGenerationError`] if the target set is empty, an id
    /// does not encode side/column/row, an id's side disagrees with its
    /// label, or ids or grid positions are duplicated.
    pub fn plan(self, targets: &[Target]) -> Result<Vec<DetectionUnit>, PathGenerationError> {
        if targets.is_empty() {
            return Err(PathGenerationError::EmptyTargets);
        }

        let grids = build_grids(targets)?;
        let mut units: Vec<DetectionUnit> = Vec::with_capacity(targets.len());

        for side in Side::ALL {
            if let Some(grid) = grids.get(&side) {
                walk_side(grid, &mut units);
            }
        }

        let stats = PathStats::of(&units);
        info!(
            holes = targets.len(),
            units = stats.units,
            pairs = stats.pairs,
            singles = stats.singles,
            "Snake path planned"
        );
        Ok(units)
    }
}

/// Group targets by side and column, validating the labelling.
fn build_grids(targets: &[Target]) -> Result<BTreeMap<Side, SideGrid>, PathGenerationError> {
    let mut grids: BTreeMap<Side, SideGrid> = BTreeMap::new();
    let mut seen: BTreeSet<&HoleId> = BTreeSet::new();

    for target in targets {
        if !seen.insert(&target.id) {
            return Err(PathGenerationError::DuplicateId {
                id: target.id.clone(),
            });
        }

        let position = target
            .id
            .position()
            .ok_or_else(|| PathGenerationError::MalformedId {
                id: target.id.clone(),
            })?;

        if position.side != target.side_label {
            return Err(PathGenerationError::SideMismatch {
                id: target.id.clone(),
                label: target.side_label,
                encoded: position.side,
            });
        }

        let column = grids
            .entry(position.side)
            .or_default()
            .entry(position.column)
            .or_default();
        if let Some(existing) = column.insert(position.row, target.id.clone()) {
            return Err(PathGenerationError::DuplicatePosition {
                first: existing,
                second: target.id.clone(),
                side: position.side,
                column: position.column,
                row: position.row,
            });
        }
    }

    Ok(grids)
}

/// Append the units for one side in snake order.
fn walk_side(grid: &SideGrid, units: &mut Vec<DetectionUnit>) {
    let mut consumed: BTreeSet<(u32, u32)> = BTreeSet::new();

    for (&column, rows) in grid {
        let ordered: Vec<(&u32, &HoleId)> = if column % 2 == 1 {
            rows.iter().collect()
        } else {
            rows.iter().rev().collect()
        };

        let partner_column = column
            .checked_add(PAIR_COLUMN_INTERVAL)
            .and_then(|c| grid.get(&c).map(|rows| (c, rows)));

        for (&row, id) in ordered {
            if !consumed.insert((column, row)) {
                continue;
            }

            let partner = partner_column.and_then(|(c, partner_rows)| {
                partner_rows
                    .get(&row)
                    .filter(|_| !consumed.contains(&(c, row)))
                    .map(|partner_id| (c, partner_id))
            });

            let index = units.len();
            match partner {
                Some((c, partner_id)) => {
                    consumed.insert((c, row));
                    units.push(DetectionUnit::pair(index, id.clone(), partner_id.clone()));
                }
                None => units.push(DetectionUnit::single(index, id.clone())),
            }
        }
    }
}
