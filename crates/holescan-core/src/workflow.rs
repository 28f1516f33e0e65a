//! Explicit wiring of partitioner, planner, and lifecycle manager.
//!
//! An [`InspectionWorkflow`] is built from its three collaborators and owns
//! them; nothing is looked up globally. A batch is prepared once from the
//! target list and then launched, or recovered from storage after a
//! restart.

use std::sync::Arc;

use holescan_events::EventPublisher;
use holescan_geometry::{
    GeometryPartitioner, Partition, PartitionError, PathGenerationError, PathPlanner, PathStats,
};
use holescan_store::SnapshotStore;
use holescan_types::{BatchId, DetectionUnit, SimulationParams, Target};
use tracing::info;

use crate::config::InspectionConfig;
use crate::error::BatchError;
use crate::lifecycle::{BatchLifecycleManager, RecoveryMode, ResumeOutcome};

/// Errors raised while preparing or launching a batch.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The targets cannot be partitioned.
    #[error("partition failed: {0}")]
    Partition(#[from] PartitionError),

    /// The targets cannot be ordered.
    #[error("path planning failed: {0}")]
    Path(#[from] PathGenerationError),

    /// A lifecycle operation failed.
    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// Everything derived from a target list before a batch starts.
#[derive(Debug, Clone)]
pub struct InspectionPlan {
    /// The targets, all pending.
    pub targets: Vec<Target>,
    /// Sector assignment of every target.
    pub partition: Partition,
    /// The snake-path unit sequence.
    pub units: Vec<DetectionUnit>,
}

impl InspectionPlan {
    /// Unit counts of the planned sequence.
    pub fn stats(&self) -> PathStats {
        PathStats::of(&self.units)
    }
}

/// Partitioner, planner, and lifecycle manager wired together.
#[derive(Debug)]
pub struct InspectionWorkflow {
    partitioner: GeometryPartitioner,
    planner: PathPlanner,
    manager: BatchLifecycleManager,
}

impl InspectionWorkflow {
    /// Wire the three collaborators together.
    pub const fn new(
        partitioner: GeometryPartitioner,
        planner: PathPlanner,
        manager: BatchLifecycleManager,
    ) -> Self {
        Self {
            partitioner,
            planner,
            manager,
        }
    }

    /// Build a workflow from configuration.
    pub fn from_config(
        config: &InspectionConfig,
        store: Arc<dyn SnapshotStore>,
        events: EventPublisher,
    ) -> Self {
        Self::new(
            GeometryPartitioner::new(config.geometry.axis_orientation),
            PathPlanner::new(),
            BatchLifecycleManager::new(store, events),
        )
    }

    /// Partition and order a target list.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Partition`] or [`WorkflowError::Path`].
    pub fn prepare(&self, targets: Vec<Target>) -> Result<InspectionPlan, WorkflowError> {
        let partition = self.partitioner.partition(&targets)?;
        let units = self.planner.plan(&targets)?;
        Ok(InspectionPlan {
            targets,
            partition,
            units,
        })
    }

    /// Create, start, and attach a driver to a new batch.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Batch`] if any lifecycle step fails.
    pub fn launch(
        &mut self,
        plan: InspectionPlan,
        product_id: &str,
        is_mock: bool,
        params: SimulationParams,
    ) -> Result<BatchId, WorkflowError> {
        let stats = plan.stats();
        let batch = self.manager.create(product_id, is_mock, params)?;
        let batch_id = batch.batch_id;
        self.manager
            .start(&batch_id, plan.targets, &plan.partition)?;
        self.manager.attach_driver(&batch_id, plan.units)?;

        info!(
            batch_id = %batch_id,
            units = stats.units,
            pairs = stats.pairs,
            singles = stats.singles,
            "Batch launched"
        );
        Ok(batch_id)
    }

    /// Reload a persisted batch and resume it.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Batch`] if recovery or resume fails.
    pub fn restore(
        &mut self,
        batch_id: &BatchId,
        plan: InspectionPlan,
        mode: RecoveryMode,
    ) -> Result<ResumeOutcome, WorkflowError> {
        self.manager
            .recover(batch_id, plan.targets, &plan.partition, plan.units)?;
        Ok(self.manager.resume(batch_id, mode)?)
    }

    /// The partitioner.
    pub const fn partitioner(&self) -> &GeometryPartitioner {
        &self.partitioner
    }

    /// The lifecycle manager.
    pub const fn manager(&self) -> &BatchLifecycleManager {
        &self.manager
    }

    /// The lifecycle manager, mutably.
    pub const fn manager_mut(&mut self) -> &mut BatchLifecycleManager {
        &mut self.manager
    }

    /// Give up the workflow and keep the manager.
    pub fn into_manager(self) -> BatchLifecycleManager {
        self.manager
    }
}
