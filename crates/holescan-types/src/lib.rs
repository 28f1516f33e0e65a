//! Shared type definitions for the hole partition and detection engine.
//!
//! This crate is the single source of truth for the data model used across
//! the workspace: hole identifiers, targets, sectors, detection units,
//! simulation parameters, summaries, and the event payloads delivered to
//! external consumers.
//!
//! # Modules
//!
//! - [`ids`] -- Hole, batch, and driver identifiers
//! - [`enums`] -- Sides, hole statuses, and sector identifiers
//! - [`structs`] -- Targets, detection units, and summaries
//! - [`params`] -- Simulation timing and outcome rates
//! - [`events`] -- Published inspection events

pub mod enums;
pub mod events;
pub mod ids;
pub mod params;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{HoleStatus, SectorId, Side};
pub use events::InspectionEvent;
pub use ids::{BatchId, DriverId, HoleId, HolePosition};
pub use params::{SimulationConfigError, SimulationParams};
pub use structs::{
    BatchSummary, DetectionUnit, HoleOutcome, SectorSummary, Target, TargetRecord,
};
