//! Fan-out of build notifications to live subscribers.
//!
//! Subscribers are plain callbacks invoked synchronously in registration
//! order. A subscriber that joins while the last build failed gets that
//! failure replayed to it alone.

use std::sync::Arc;

use parking_lot::Mutex;

/// Notifications pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    /// A new artifact is current; re-fetch it.
    Refresh,
    /// The last build failed.
    BuildError(String),
}

impl BuildEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            BuildEvent::Refresh => "refresh",
            BuildEvent::BuildError(_) => "build-error",
        }
    }

    /// Wire payload; empty for `refresh`.
    pub fn payload(&self) -> &str {
        match self {
            BuildEvent::Refresh => "",
            BuildEvent::BuildError(message) => message,
        }
    }
}

pub type Subscriber = Arc<dyn Fn(&BuildEvent) + Send + Sync>;

/// Handle returned by [`EventBroadcaster::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Inner {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    replay: Option<String>,
}

#[derive(Default)]
pub struct EventBroadcaster {
    inner: Mutex<Inner>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber.
    ///
    /// Registering the same callback twice returns the existing handle.
    /// While a failure is recorded for replay, it is delivered to this
    /// subscriber before `subscribe` returns.
    pub fn subscribe(&self, subscriber: Subscriber) -> SubscriptionId {
        let (id, replay) = {
            let mut inner = self.inner.lock();
            if let Some((id, _)) = inner
                .subscribers
                .iter()
                .find(|(_, existing)| Arc::ptr_eq(existing, &subscriber))
            {
                return *id;
            }
            let id = SubscriptionId(inner.next_id);
            inner.next_id += 1;
            inner.subscribers.push((id, subscriber.clone()));
            (id, inner.replay.clone())
        };

        crate::debug_event!("broadcast", "subscribed", "{id:?}");
        if let Some(message) = replay {
            crate::debug_event!("broadcast", "replaying build-error", "{id:?}");
            subscriber(&BuildEvent::BuildError(message));
        }
        id
    }

    /// Remove a subscriber. Unknown handles are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.inner.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(existing, _)| *existing != id);
        if inner.subscribers.len() != before {
            crate::debug_event!("broadcast", "unsubscribed", "{id:?}");
        }
    }

    /// Deliver an event to every subscriber, in registration order.
    pub fn emit(&self, event: BuildEvent) {
        // Snapshot so callbacks may (un)subscribe without deadlocking.
        let subscribers = Self::snapshot(&self.inner.lock());
        Self::deliver(&event, subscribers);
    }

    /// Broadcast a failure and keep it for replay to later subscribers.
    ///
    /// Recording the replay and snapshotting the current subscribers happen
    /// under one lock, so every subscriber sees the failure exactly once.
    pub fn emit_failure(&self, message: String) {
        let subscribers = {
            let mut inner = self.inner.lock();
            inner.replay = Some(message.clone());
            Self::snapshot(&inner)
        };
        Self::deliver(&BuildEvent::BuildError(message), subscribers);
    }

    fn snapshot(inner: &Inner) -> Vec<Subscriber> {
        inner
            .subscribers
            .iter()
            .map(|(_, subscriber)| subscriber.clone())
            .collect()
    }

    fn deliver(event: &BuildEvent, subscribers: Vec<Subscriber>) {
        crate::debug_event!(
            "broadcast",
            "sent",
            "{} to {} subscribers",
            event.name(),
            subscribers.len()
        );
        for subscriber in subscribers {
            subscriber(event);
        }
    }

    /// Set or clear the failure replayed to late joiners.
    pub fn set_replay(&self, failure: Option<String>) {
        self.inner.lock().replay = failure;
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}
