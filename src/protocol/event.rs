//! Channel events and observer registration.
//!
//! Events are broadcast to every registered observer in registration order.
//!
//! # Event Types
//!
//! | Event | Fired when |
//! |-------|------------|
//! | `Connected` | Liveness probe of a new transport succeeded |
//! | `Disconnected` | Current transport's stream closed |
//! | `CommandStarting` | A text frame was received, before its action runs |
//! | `LatencyMeasured` | A latency readout succeeded |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use crate::dispatch::LatencyReading;
use crate::identifiers::{SessionId, SubscriptionId};

// ============================================================================
// Types
// ============================================================================

/// Observer callback type.
///
/// Called synchronously on the task that emitted the event; keep it short.
pub type EventHandler = Arc<dyn Fn(&ChannelEvent) + Send + Sync>;

// ============================================================================
// ChannelEvent
// ============================================================================

/// Lifecycle events of the remote-command channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A (re)connection passed its liveness probe.
    Connected {
        /// Session that became live.
        session: SessionId,
    },

    /// The current session's stream was closed by the peer or ended.
    Disconnected {
        /// Session that closed.
        session: SessionId,
    },

    /// A command frame arrived; carries the raw text.
    CommandStarting(String),

    /// A latency readout completed.
    LatencyMeasured(LatencyReading),
}

impl ChannelEvent {
    /// Returns a short name for logging.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Disconnected { .. } => "disconnected",
            Self::CommandStarting(_) => "commandStarting",
            Self::LatencyMeasured(_) => "latencyMeasured",
        }
    }
}

// ============================================================================
// EventBus
// ============================================================================

/// A registered observer.
#[derive(Clone)]
enum Observer {
    Callback(EventHandler),
    Channel(mpsc::UnboundedSender<ChannelEvent>),
}

impl Observer {
    /// A channel observer whose receiver was dropped.
    fn is_closed(&self) -> bool {
        matches!(self, Self::Channel(tx) if tx.is_closed())
    }

    fn deliver(&self, event: &ChannelEvent) {
        match self {
            Self::Callback(handler) => handler(event),
            Self::Channel(tx) => {
                let _ = tx.send(event.clone());
            }
        }
    }
}

/// Explicit observer list for [`ChannelEvent`]s.
///
/// # Example
///
/// ```ignore
/// let bus = EventBus::new();
/// let id = bus.subscribe(|event| println!("{}", event.name()));
/// bus.emit(&ChannelEvent::CommandStarting("picture".into()));
/// bus.unsubscribe(id);
/// ```
#[derive(Default)]
pub struct EventBus {
    observers: Mutex<Vec<(SubscriptionId, Observer)>>,
}

impl EventBus {
    /// Creates an empty bus.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback observer.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        self.register(Observer::Callback(Arc::new(handler)))
    }

    /// Registers an observer that receives events on an unbounded channel.
    ///
    /// Dropping the receiver unsubscribes it on the next emit.
    pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (self.register(Observer::Channel(tx)), rx)
    }

    fn register(&self, observer: Observer) -> SubscriptionId {
        let id = SubscriptionId::generate();
        self.observers.lock().push((id, observer));
        id
    }

    /// Removes an observer. Returns `true` if it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Returns the number of registered observers.
    #[inline]
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    /// Delivers `event` to every observer.
    ///
    /// Closed channel observers are pruned first. The list is then
    /// snapshotted, so observers may subscribe or unsubscribe from inside a
    /// callback.
    pub fn emit(&self, event: &ChannelEvent) {
        let snapshot: Vec<Observer> = {
            let mut observers = self.observers.lock();
            observers.retain(|(id, observer)| {
                let closed = observer.is_closed();
                if closed {
                    trace!(subscription = %id, "Dropping closed channel observer");
                }
                !closed
            });
            observers.iter().map(|(_, observer)| observer.clone()).collect()
        };

        trace!(event = event.name(), observers = snapshot.len(), "Emitting event");

        for observer in &snapshot {
            observer.deliver(event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observer_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_reaches_every_observer() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = Arc::clone(&count);
            bus.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        bus.emit(&ChannelEvent::CommandStarting("video".into()));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let id = bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.observer_count(), 0);

        bus.emit(&ChannelEvent::CommandStarting("video".into()));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscribe_from_inside_handler() {
        let bus = Arc::new(EventBus::new());
        let inner = Arc::clone(&bus);
        bus.subscribe(move |_| {
            inner.subscribe(|_| {});
        });

        bus.emit(&ChannelEvent::CommandStarting("picture".into()));
        assert_eq!(bus.observer_count(), 2);
    }

    #[tokio::test]
    async fn test_subscribe_channel() {
        let bus = EventBus::new();
        let (_, mut rx) = bus.subscribe_channel();
        let session = SessionId::next();

        bus.emit(&ChannelEvent::Connected { session });
        bus.emit(&ChannelEvent::CommandStarting("zoom-in".into()));

        assert_eq!(rx.recv().await, Some(ChannelEvent::Connected { session }));
        assert_eq!(
            rx.recv().await,
            Some(ChannelEvent::CommandStarting("zoom-in".into()))
        );
    }

    #[test]
    fn test_dropped_channel_receiver_is_pruned() {
        let bus = EventBus::new();
        let (_, kept) = bus.subscribe_channel();
        let (_, dropped) = bus.subscribe_channel();
        assert_eq!(bus.observer_count(), 2);

        drop(dropped);
        for _ in 0..3 {
            bus.emit(&ChannelEvent::CommandStarting("picture".into()));
        }

        assert_eq!(bus.observer_count(), 1);
        assert!(!kept.is_closed());
    }

    #[test]
    fn test_event_names() {
        assert_eq!(
            ChannelEvent::CommandStarting(String::new()).name(),
            "commandStarting"
        );
        assert_eq!(
            ChannelEvent::Connected {
                session: SessionId::next()
            }
            .name(),
            "connected"
        );
    }
}
