//! Inspection engine binary.
//!
//! Wires the partitioner, path planner, lifecycle manager, and tick loop
//! together and inspects one batch, either new or reloaded from storage.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `holescan-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Load the target list
//! 4. Open the snapshot store and event bus
//! 5. Partition the targets and plan the snake path
//! 6. Launch a new batch, or restore `input.resume_batch`
//! 7. Install the Ctrl-C stop handler
//! 8. Run the tick loop
//! 9. Log the result

mod error;
mod input;
mod progress;

use std::path::Path;
use std::sync::Arc;

use holescan_core::config::CONFIG_FILE_NAME;
use holescan_core::{
    DriverControl, InspectionConfig, InspectionWorkflow, RunEndReason, RunOptions, run_batch,
};
use holescan_events::EventPublisher;
use holescan_store::{FileSnapshotStore, SnapshotStore};
use holescan_types::BatchId;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::progress::{ProgressLogger, spawn_event_log};

/// Units between info-level progress lines.
const PROGRESS_EVERY_UNITS: usize = 50;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step or the tick loop fails.
#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = Path::new(CONFIG_FILE_NAME);
    let config_found = config_path.exists();
    let config = load_config(config_path)?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("holescan-engine starting");
    if !config_found {
        info!("Config file not found, using defaults");
    }
    info!(
        product_id = %config.input.product_id,
        is_mock = config.input.is_mock,
        root_dir = %config.storage.root_dir.display(),
        tick_interval_ms = config.simulation.tick_interval_ms,
        unit_dwell_ms = config.simulation.unit_dwell_ms,
        seed = config.simulation.seed,
        "Configuration loaded"
    );

    // 3. Load targets.
    let targets = input::load_targets(&config.input.targets_path)?;

    // 4. Storage and events.
    let store: Arc<dyn SnapshotStore> =
        Arc::new(FileSnapshotStore::new(config.storage.root_dir.clone()));
    let events = EventPublisher::new();
    let event_log = spawn_event_log(&events);

    // 5. Partition and plan.
    let mut workflow = InspectionWorkflow::from_config(&config, store, events);
    let plan = workflow.prepare(targets).map_err(EngineError::from)?;
    let total_units = plan.units.len();

    // 6. Launch or restore.
    let batch_id = match &config.input.resume_batch {
        Some(raw) => {
            let batch_id = BatchId::new(raw.as_str());
            let outcome = workflow
                .restore(&batch_id, plan, config.recovery.mode)
                .map_err(EngineError::from)?;
            info!(
                batch_id = %batch_id,
                current_index = outcome.current_index,
                elapsed_ms = outcome.elapsed_ms,
                restarted = outcome.restarted,
                "Batch restored"
            );
            batch_id
        }
        None => workflow
            .launch(
                plan,
                &config.input.product_id,
                config.input.is_mock,
                config.simulation,
            )
            .map_err(EngineError::from)?,
    };

    // 7. Operator controls.
    let control = Arc::new(DriverControl::new(config.simulation.tick_interval_ms));
    let stopper = Arc::clone(&control);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping batch");
            stopper.request_stop();
        }
    });

    // 8. Run.
    let mut manager = workflow.into_manager();
    let options = RunOptions {
        pacing: config.runner.pacing,
        recovery: config.recovery.mode,
    };
    let mut observer = ProgressLogger::new(total_units, PROGRESS_EVERY_UNITS);
    let result = run_batch(&mut manager, &batch_id, &control, options, &mut observer)
        .await
        .map_err(EngineError::from)?;

    // 9. Log the result.
    match (&result.end_reason, &result.summary) {
        (RunEndReason::Completed, Some(summary)) => info!(
            batch_id = %batch_id,
            total = summary.total,
            qualified = summary.qualified,
            defective = summary.defective,
            blind = summary.blind,
            uncertain = summary.uncertain,
            error = summary.error,
            qualification_rate = summary.qualification_rate,
            "Batch summary"
        ),
        (reason, _) => warn!(batch_id = %batch_id, reason = ?reason, "Batch did not complete"),
    }

    drop(manager);
    if let Err(e) = event_log.await {
        warn!(error = %e, "Event log task failed");
    }
    info!(ticks = result.ticks, "holescan-engine shutdown complete");
    Ok(())
}

/// Load the configuration file, or defaults when it does not exist.
fn load_config(path: &Path) -> Result<InspectionConfig, EngineError> {
    if path.exists() {
        Ok(InspectionConfig::from_file(path)?)
    } else {
        let mut config = InspectionConfig::default();
        config.storage.apply_env_overrides();
        Ok(config)
    }
}
