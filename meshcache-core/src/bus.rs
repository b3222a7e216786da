//! # Message Bus
//!
//! Broadcasts invalidation notices to every node in a cluster without
//! each writer having to know the full peer list and fan out RPCs itself.
//! A write publishes one `Invalidation`; every subscribed node purges its
//! own hot and main tiers in response. The in-process implementation here
//! hands each subscriber its own `mpsc::Sender`, pruning a subscriber once
//! its receiver is dropped rather than leaving a dead entry in the list.

use std::sync::mpsc::{Receiver, Sender};
use std::sync::Mutex;

/// An invalidation notice: `group`'s entry for `key` has been written or
/// removed and every other tier holding it must drop its copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub group: String,
    pub key: String,
}

/// Publishes and distributes [`Invalidation`] notices across subscribers.
///
/// Implementors decide the transport: [`InMemoryBus`] fans out in-process
/// via channels; a cluster deployment would back this with a real message
/// queue's pub/sub client while keeping the same trait.
pub trait MessageBus: Send + Sync {
    /// Publishes `invalidation` to every current and future subscriber.
    fn publish(&self, invalidation: Invalidation);

    /// Registers a new subscriber, returning a channel that receives
    /// every invalidation published after this call.
    fn subscribe(&self) -> Receiver<Invalidation>;
}

/// An in-process [`MessageBus`] that fans invalidations out to every
/// subscribed channel. Suitable for a single-process cluster simulation
/// or as the default when no external bus is configured.
pub struct InMemoryBus {
    subscribers: Mutex<Vec<Sender<Invalidation>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        InMemoryBus { subscribers: Mutex::new(Vec::new()) }
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        InMemoryBus::new()
    }
}

impl MessageBus for InMemoryBus {
    fn publish(&self, invalidation: Invalidation) {
        let mut subscribers = self.subscribers.lock().expect("subscriber list poisoned");
        subscribers.retain(|sender| sender.send(invalidation.clone()).is_ok());
    }

    fn subscribe(&self) -> Receiver<Invalidation> {
        let (sender, receiver) = std::sync::mpsc::channel();
        self.subscribers.lock().expect("subscriber list poisoned").push(sender);
        receiver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn subscriber_receives_published_invalidation() {
        let bus = InMemoryBus::new();
        let receiver = bus.subscribe();
        bus.publish(Invalidation { group: "scores".into(), key: "alice".into() });

        let received = receiver.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(received, Invalidation { group: "scores".into(), key: "alice".into() });
    }

    #[test]
    fn every_subscriber_gets_its_own_copy() {
        let bus = InMemoryBus::new();
        let first = bus.subscribe();
        let second = bus.subscribe();
        bus.publish(Invalidation { group: "scores".into(), key: "alice".into() });

        assert!(first.recv_timeout(Duration::from_millis(100)).is_ok());
        assert!(second.recv_timeout(Duration::from_millis(100)).is_ok());
    }

    #[test]
    fn dropped_subscriber_is_pruned_on_next_publish() {
        let bus = InMemoryBus::new();
        {
            let _receiver = bus.subscribe();
        }
        bus.publish(Invalidation { group: "scores".into(), key: "alice".into() });
        assert_eq!(bus.subscribers.lock().unwrap().len(), 0);
    }
}
