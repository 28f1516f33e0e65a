//! Error types for the `holescan-geometry` crate.
//!
//! Both error types describe deterministic input problems. They are
//! surfaced to the caller immediately and never retried.

use holescan_types::{HoleId, Side};

/// Errors raised while partitioning targets into sectors.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PartitionError {
    /// No targets were supplied.
    #[error("cannot partition an empty target list")]
    EmptyTargets,

    /// Every target sits exactly on the reference center.
    #[error("degenerate geometry: all {count} targets sit at the center ({x}, {y})")]
    DegenerateGeometry {
        /// Number of targets.
        count: usize,
        /// Center x coordinate.
        x: f64,
        /// Center y coordinate.
        y: f64,
    },

    /// A target has a NaN or infinite coordinate.
    #[error("target {id} has a non-finite coordinate ({x}, {y})")]
    NonFiniteCoordinate {
        /// The offending target.
        id: HoleId,
        /// Its x coordinate.
        x: f64,
        /// Its y coordinate.
        y: f64,
    },
}

/// Errors raised while planning the detection path.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathGenerationError {
    /// No targets were supplied.
    #[error("cannot plan a path over an empty target set")]
    EmptyTargets,

    /// A hole id does not encode side, column, and row.
    #[error("hole id {id} does not follow the {{side}}C{{column}}R{{row}} structure")]
    MalformedId {
        /// The offending id.
        id: HoleId,
    },

    /// The side encoded in the id disagrees with the side label.
    #[error("hole {id} is labelled side {label} but its id encodes side {encoded}")]
    SideMismatch {
        /// The offending id.
        id: HoleId,
        /// The supplied side label.
        label: Side,
        /// The side encoded in the id.
        encoded: Side,
    },

    /// The same id appears more than once.
    #[error("duplicate hole id {id}")]
    DuplicateId {
        /// The repeated id.
        id: HoleId,
    },

    /// Two different ids decode to the same grid position.
    #[error("holes {first} and {second} share side {side}, column {column}, row {row}")]
    DuplicatePosition {
        /// The first id seen at the position.
        first: HoleId,
        /// The second id at the same position.
        second: HoleId,
        /// Shared side.
        side: Side,
        /// Shared column.
        column: u32,
        /// Shared row.
        row: u32,
    },
}
