//! Shared control state for a running batch.
//!
//! [`DriverControl`] is shared between the tick loop and whoever operates
//! the batch (an operator console, a signal handler, a test). Requests are
//! plain atomic flags; the loop observes them only at tick boundaries.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Notify;

/// Smallest accepted wall-clock tick interval.
pub const MIN_TICK_INTERVAL_MS: u64 = 1;

/// Pause, resume, stop, and pacing requests for one tick loop.
#[derive(Debug)]
pub struct DriverControl {
    /// Whether a pause has been requested.
    paused: AtomicBool,

    /// Whether a stop has been requested.
    stop_requested: AtomicBool,

    /// Wakes the loop while it waits in the paused state.
    wake: Notify,

    /// Wall-clock pacing between ticks, in milliseconds.
    tick_interval_ms: AtomicU64,
}

impl DriverControl {
    /// Create control state with the given wall-clock tick interval.
    pub fn new(tick_interval_ms: u64) -> Self {
        Self {
            paused: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            wake: Notify::new(),
            tick_interval_ms: AtomicU64::new(tick_interval_ms.max(MIN_TICK_INTERVAL_MS)),
        }
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// Whether a pause is in effect.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Ask the loop to pause at the next tick boundary.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Lift the pause and wake the loop.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.wake.notify_one();
    }

    /// Wait until the pause is lifted or a stop is requested.
    pub async fn wait_while_paused(&self) {
        while self.is_paused() && !self.is_stop_requested() {
            self.wake.notified().await;
        }
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Ask the loop to terminate the batch at the next tick boundary.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    // -----------------------------------------------------------------------
    // Pacing
    // -----------------------------------------------------------------------

    /// Current wall-clock tick interval.
    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms.load(Ordering::Acquire)
    }

    /// Change the wall-clock tick interval.
    ///
    /// Returns the previous interval, or `None` if `ms` is below
    /// [`MIN_TICK_INTERVAL_MS`]. Simulated time per tick is unaffected.
    pub fn set_tick_interval_ms(&self, ms: u64) -> Option<u64> {
        if ms < MIN_TICK_INTERVAL_MS {
            return None;
        }
        Some(self.tick_interval_ms.swap(ms, Ordering::AcqRel))
    }
}
