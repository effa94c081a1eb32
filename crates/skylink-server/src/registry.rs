//! Subscriber registry.
//!
//! Tracks every observer connection by a monotonically increasing id. Ids are
//! never reused, so a stale id held by an in-flight broadcast can never prune
//! a newer subscriber.
//!
//! The registry itself is not synchronized. The coordinator keeps it behind a
//! `std::sync::Mutex` and never holds that lock across an `.await`: fan-out
//! works on a [`snapshot`](SubscriberRegistry::snapshot).

use std::collections::HashMap;

use skylink_proto::Message;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Identifier of a subscriber connection.
pub type SubscriberId = u64;

/// What the coordinator needs to reach one subscriber.
#[derive(Debug, Clone)]
pub struct SubscriberHandle {
    /// Outbound half of the subscriber's connection
    pub sender: mpsc::Sender<Message>,
    /// Cancels the task serving this subscriber
    pub cancel: CancellationToken,
}

/// Registry of connected subscribers.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    next_id: SubscriberId,
    subscribers: HashMap<SubscriberId, SubscriberHandle>,
}

impl SubscriberRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber and return its fresh id.
    pub fn register(&mut self, handle: SubscriberHandle) -> SubscriberId {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.insert(id, handle);
        id
    }

    /// Remove a subscriber. `None` if it was already gone.
    pub fn remove(&mut self, id: SubscriberId) -> Option<SubscriberHandle> {
        self.subscribers.remove(&id)
    }

    /// Copy of every handle, for delivery outside the lock.
    pub fn snapshot(&self) -> Vec<(SubscriberId, SubscriberHandle)> {
        self.subscribers.iter().map(|(id, handle)| (*id, handle.clone())).collect()
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether no subscriber is registered.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Remove and cancel every subscriber.
    pub fn clear(&mut self) {
        for (_, handle) in self.subscribers.drain() {
            handle.cancel.cancel();
        }
    }
}
