//! Typed event bus with bounded per-subscriber queues.
//!
//! The bus is the engine's only output surface. Each subscriber gets an
//! independent FIFO queue; delivery is at-most-once per subscriber, in
//! publish order. Back-pressure is explicit: a subscriber that lets its
//! queue overflow is detached, and the remaining subscribers are told via
//! [`EngineEvent::SubscriberDropped`] - publishing never blocks a worker.
//!
//! Subscribers declare the event kinds they want at registration; handles
//! are revocable with [`EventBus::unsubscribe`] or by dropping the
//! receiver.

use std::collections::HashSet;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::types::{FailureReason, MonitoredEvent, MonitoredTransaction, ReorgRecord, UserAction};

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default per-subscriber queue bound.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything the engine publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EngineEvent {
    /// A transaction matching the watch-list/filters was first observed.
    TransactionDetected(MonitoredTransaction),
    /// A transaction reached the confirmation threshold.
    TransactionConfirmed(MonitoredTransaction),
    /// A transaction terminally failed.
    TransactionFailed {
        /// The transaction at failure time.
        transaction: MonitoredTransaction,
        /// Why it failed.
        reason: FailureReason,
    },
    /// A reorganization moved or removed a tracked transaction.
    TransactionReorganized(MonitoredTransaction),
    /// A log matching an event filter was first observed.
    EventDetected(MonitoredEvent),
    /// An event reached the confirmation threshold.
    EventConfirmed(MonitoredEvent),
    /// A reorganization invalidated an observed event's placement.
    EventReorganized(MonitoredEvent),
    /// A block hash changed at an already-seen height.
    ChainReorganization(ReorgRecord),
    /// Confirmed events of one transaction coalesced into a user action.
    UserActionDetected(UserAction),
    /// A historical scan finished.
    BackfillCompleted {
        /// First scanned block.
        from_block: u64,
        /// Last scanned block.
        to_block: u64,
    },
    /// A slow subscriber overflowed its queue and was detached.
    SubscriberDropped {
        /// The detached subscription id.
        subscriber: Uuid,
    },
}

/// Discriminant used for kind-filtered subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EventKind {
    /// [`EngineEvent::TransactionDetected`]
    TransactionDetected,
    /// [`EngineEvent::TransactionConfirmed`]
    TransactionConfirmed,
    /// [`EngineEvent::TransactionFailed`]
    TransactionFailed,
    /// [`EngineEvent::TransactionReorganized`]
    TransactionReorganized,
    /// [`EngineEvent::EventDetected`]
    EventDetected,
    /// [`EngineEvent::EventConfirmed`]
    EventConfirmed,
    /// [`EngineEvent::EventReorganized`]
    EventReorganized,
    /// [`EngineEvent::ChainReorganization`]
    ChainReorganization,
    /// [`EngineEvent::UserActionDetected`]
    UserActionDetected,
    /// [`EngineEvent::BackfillCompleted`]
    BackfillCompleted,
    /// [`EngineEvent::SubscriberDropped`]
    SubscriberDropped,
}

impl EngineEvent {
    /// The kind discriminant of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::TransactionDetected(_) => EventKind::TransactionDetected,
            Self::TransactionConfirmed(_) => EventKind::TransactionConfirmed,
            Self::TransactionFailed { .. } => EventKind::TransactionFailed,
            Self::TransactionReorganized(_) => EventKind::TransactionReorganized,
            Self::EventDetected(_) => EventKind::EventDetected,
            Self::EventConfirmed(_) => EventKind::EventConfirmed,
            Self::EventReorganized(_) => EventKind::EventReorganized,
            Self::ChainReorganization(_) => EventKind::ChainReorganization,
            Self::UserActionDetected(_) => EventKind::UserActionDetected,
            Self::BackfillCompleted { .. } => EventKind::BackfillCompleted,
            Self::SubscriberDropped { .. } => EventKind::SubscriberDropped,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUBSCRIPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// A live subscription handle.
///
/// Dropping the receiver revokes the subscription on the next publish.
#[derive(Debug)]
pub struct Subscription {
    /// Identity, usable with [`EventBus::unsubscribe`].
    pub id: Uuid,
    /// The subscriber's queue.
    pub events: mpsc::Receiver<EngineEvent>,
}

#[derive(Debug)]
struct SubscriberEntry {
    id: Uuid,
    /// `None` = all kinds.
    kinds: Option<HashSet<EventKind>>,
    sender: mpsc::Sender<EngineEvent>,
}

impl SubscriberEntry {
    fn wants(&self, event: &EngineEvent) -> bool {
        self.kinds
            .as_ref()
            .is_none_or(|kinds| kinds.contains(&event.kind()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT BUS
// ═══════════════════════════════════════════════════════════════════════════════

/// Multi-subscriber broadcast with per-subscriber bounded FIFO queues.
#[derive(Debug)]
pub struct EventBus {
    subscribers: Mutex<Vec<SubscriberEntry>>,
    queue_capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a bus with the default queue capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a bus with a custom per-subscriber queue capacity.
    #[must_use]
    pub fn with_capacity(queue_capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Subscribe to every event kind.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.subscribe_entry(None)
    }

    /// Subscribe to a specific set of event kinds.
    #[must_use]
    pub fn subscribe_to(&self, kinds: impl IntoIterator<Item = EventKind>) -> Subscription {
        self.subscribe_entry(Some(kinds.into_iter().collect()))
    }

    fn subscribe_entry(&self, kinds: Option<HashSet<EventKind>>) -> Subscription {
        let (sender, events) = mpsc::channel(self.queue_capacity);
        let id = Uuid::new_v4();
        self.subscribers.lock().push(SubscriberEntry {
            id,
            kinds,
            sender,
        });
        debug!(%id, "Subscriber registered");
        Subscription { id, events }
    }

    /// Revoke a subscription.
    ///
    /// Returns whether the id was registered.
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        before != subscribers.len()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Publish one event to every interested subscriber.
    ///
    /// Never blocks: a full queue detaches its subscriber, and the drop is
    /// announced to everyone still attached.
    pub fn publish(&self, event: &EngineEvent) {
        metrics::counter!("chainwatch_bus_events_published").increment(1);

        let mut overflowed = Vec::new();
        {
            let mut subscribers = self.subscribers.lock();
            subscribers.retain(|subscriber| {
                if !subscriber.wants(event) {
                    return true;
                }
                match subscriber.sender.try_send(event.clone()) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        warn!(id = %subscriber.id, "Subscriber queue overflow, detaching");
                        overflowed.push(subscriber.id);
                        false
                    }
                    // Receiver dropped: silent revocation.
                    Err(TrySendError::Closed(_)) => false,
                }
            });
        }

        for subscriber in overflowed {
            metrics::counter!("chainwatch_bus_subscribers_dropped").increment(1);
            self.publish(&EngineEvent::SubscriberDropped { subscriber });
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
