//! Error types for the batch lifecycle.

use holescan_store::StoreError;
use holescan_types::{BatchId, SimulationConfigError};

use crate::batch::BatchStatus;

/// Errors raised by [`BatchLifecycleManager`](crate::lifecycle::BatchLifecycleManager).
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// The operation would break an exclusivity rule: a second active batch
    /// for the same product, or a second driver on one batch.
    #[error("conflict on batch {batch_id}: {reason}")]
    Conflict {
        /// The batch the operation targeted.
        batch_id: BatchId,
        /// What is already holding the resource.
        reason: String,
    },

    /// A persisted snapshot is missing or does not match the live batch.
    #[error("cannot recover batch {batch_id}: {reason}")]
    StateRecovery {
        /// The batch being restored.
        batch_id: BatchId,
        /// Why the snapshot was rejected.
        reason: String,
    },

    /// The requested status change is not allowed.
    #[error("batch {batch_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// The batch.
        batch_id: BatchId,
        /// Its current status.
        from: BatchStatus,
        /// The requested status.
        to: BatchStatus,
    },

    /// The operation needs a running batch.
    #[error("batch {batch_id} is {status}, not running")]
    NotRunning {
        /// The batch.
        batch_id: BatchId,
        /// Its current status.
        status: BatchStatus,
    },

    /// No batch with this id is loaded.
    #[error("unknown batch {batch_id}")]
    UnknownBatch {
        /// The id that was looked up.
        batch_id: BatchId,
    },

    /// Simulation parameters failed validation.
    #[error("invalid simulation parameters: {0}")]
    SimulationConfig(#[from] SimulationConfigError),

    /// The snapshot store failed.
    #[error("snapshot store error: {0}")]
    Store(#[from] StoreError),

    /// A unit sequence does not cover the live target set exactly once.
    #[error("invalid unit sequence for batch {batch_id}: {reason}")]
    UnitSequence {
        /// The batch.
        batch_id: BatchId,
        /// What is wrong with the sequence.
        reason: String,
    },

    /// The target set and its partition disagree.
    #[error("invalid target set for batch {batch_id}: {reason}")]
    TargetSet {
        /// The batch.
        batch_id: BatchId,
        /// What is wrong with the targets.
        reason: String,
    },

    /// Completion was requested while holes are still unfinished.
    #[error("batch {batch_id} still has {remaining} unfinished holes")]
    Incomplete {
        /// The batch.
        batch_id: BatchId,
        /// Holes without a final status.
        remaining: usize,
    },

    /// The per-product detection counter cannot grow any further.
    #[error("detection numbers exhausted for product {product_id}")]
    DetectionNumberExhausted {
        /// The product.
        product_id: String,
    },
}
