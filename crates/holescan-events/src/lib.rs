//! Typed publish/subscribe bus for inspection events.
//!
//! Every [`InspectionEvent`] is delivered two ways:
//!
//! - queued, through a [`tokio::sync::broadcast`] channel, for consumers
//!   running on their own task (UI bridges, log shippers);
//! - synchronously, to registered [`EventListener`]s, in the order they
//!   were added, before [`EventPublisher::publish`] returns. Events a
//!   listener publishes from inside its callback are queued and follow
//!   once the current event has been delivered.
//!
//! Publishing never fails. Having no subscribers is normal, and a queued
//! subscriber that falls behind by more than [`BROADCAST_CAPACITY`] events
//! receives [`broadcast::error::RecvError::Lagged`] and skips ahead.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use holescan_types::InspectionEvent;
use tokio::sync::broadcast;
use tracing::trace;

/// Capacity of the queued delivery channel.
pub const BROADCAST_CAPACITY: usize = 1024;

/// A synchronous event consumer.
pub trait EventListener: Send {
    /// Handle one event. Called on the publishing task.
    ///
    /// The listener may publish to the same bus. Those events are delivered
    /// after this call returns.
    fn on_event(&mut self, event: &InspectionEvent);
}

/// Shared handle to the event bus.
///
/// Clones share the same channel and listener list.
///
/// Listeners may publish or register listeners on the bus they are called
/// from. An event published while a dispatch is running is queued and
/// delivered by the outermost [`publish`](Self::publish) once the current
/// event has reached every listener, so listeners always observe events in
/// publish order.
#[derive(Clone)]
pub struct EventPublisher {
    tx: broadcast::Sender<InspectionEvent>,
    listeners: Arc<Mutex<Vec<Box<dyn EventListener>>>>,
    dispatch: Arc<Mutex<DispatchState>>,
}

/// Re-entrancy bookkeeping for [`EventPublisher::publish`].
#[derive(Debug, Default)]
struct DispatchState {
    active: bool,
    pending: VecDeque<InspectionEvent>,
}

impl EventPublisher {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            listeners: Arc::new(Mutex::new(Vec::new())),
            dispatch: Arc::new(Mutex::new(DispatchState::default())),
        }
    }

    /// Subscribe to queued delivery.
    pub fn subscribe(&self) -> broadcast::Receiver<InspectionEvent> {
        self.tx.subscribe()
    }

    /// Register a synchronous listener.
    ///
    /// A listener added during a dispatch first sees the next event.
    pub fn add_listener<L>(&self, listener: L)
    where
        L: EventListener + 'static,
    {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(listener));
    }

    /// Number of registered synchronous listeners.
    ///
    /// Listeners that are being called right now are not counted.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Deliver an event to every listener and queued subscriber.
    ///
    /// Returns the number of queued subscribers that received it, or 0 when
    /// the event was deferred behind a dispatch already in progress.
    pub fn publish(&self, event: InspectionEvent) -> usize {
        {
            let mut dispatch = self.dispatch.lock().unwrap_or_else(PoisonError::into_inner);
            if dispatch.active {
                trace!(batch_id = %event.batch_id(), "Event deferred behind running dispatch");
                dispatch.pending.push_back(event);
                return 0;
            }
            dispatch.active = true;
        }

        let receivers = self.deliver(event);
        while let Some(deferred) = self.next_deferred() {
            self.deliver(deferred);
        }
        receivers
    }

    /// Pop the next deferred event, ending the dispatch when none is left.
    fn next_deferred(&self) -> Option<InspectionEvent> {
        let mut dispatch = self.dispatch.lock().unwrap_or_else(PoisonError::into_inner);
        let next = dispatch.pending.pop_front();
        if next.is_none() {
            dispatch.active = false;
        }
        next
    }

    /// Run one event through the listeners and the channel.
    ///
    /// The listener list is taken out of its lock for the duration of the
    /// calls, so a listener can reach the bus without blocking on it.
    fn deliver(&self, event: InspectionEvent) -> usize {
        let mut running = std::mem::take(
            &mut *self.listeners.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for listener in &mut running {
            listener.on_event(&event);
        }
        {
            let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            running.append(&mut *listeners);
            *listeners = running;
        }

        trace!(batch_id = %event.batch_id(), "Event published");
        // send only fails when nobody is subscribed.
        self.tx.send(event).unwrap_or(0)
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPublisher")
            .field("receivers", &self.tx.receiver_count())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Listener that keeps every event it sees.
///
/// Clones share the same log, so one copy can be registered while another
/// is inspected.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<InspectionEvent>>>,
}

impl EventRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the events recorded so far, oldest first.
    pub fn events(&self) -> Vec<InspectionEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of events recorded so far.
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventListener for EventRecorder {
    fn on_event(&mut self, event: &InspectionEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
