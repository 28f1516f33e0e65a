//! Geometry for the hole partition and detection engine.
//!
//! This crate turns a flat list of labelled targets into the two structures
//! the rest of the engine works from: a four-way angular partition around
//! the workpiece center, and the ordered snake path the inspection head
//! follows.
//!
//! # Modules
//!
//! - [`error`] -- Error types for partitioning and path planning.
//! - [`partition`] -- [`GeometryPartitioner`] computes the bounding-box
//!   center and assigns every target to exactly one [`Sector`].
//! - [`path`] -- [`PathPlanner`] produces the deterministic
//!   [`DetectionUnit`] sequence with interval-4 column pairing.
//!
//! [`DetectionUnit`]: holescan_types::DetectionUnit

pub mod error;
pub mod partition;
pub mod path;

// Re-export primary types at crate root.
pub use error::{PartitionError, PathGenerationError};
pub use partition::{AxisOrientation, GeometryPartitioner, Partition, Point, Sector};
pub use path::{PAIR_COLUMN_INTERVAL, PathPlanner, PathStats};
