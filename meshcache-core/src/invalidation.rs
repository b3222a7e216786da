//! # Background Invalidation Listener
//!
//! Subscribes to a [`MessageBus`] and evicts locally on every notice that
//! arrives, so a write on one node purges stale copies on every other node
//! without each of them polling. Runs on its own thread, stopped via an
//! `AtomicBool` flag the same way [`crate::sweeper::SweeperHandle`] is, so
//! `Drop` can signal it without blocking on a channel send.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use crate::bus::MessageBus;
use crate::registry;

/// Bounds how long each receive blocks before re-checking the stop flag,
/// so dropping the handle doesn't have to wait out an arbitrarily long
/// quiet period on the bus.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Owns a background thread that reacts to every [`Invalidation`](crate::bus::Invalidation)
/// published on a bus by evicting the matching key from the named group's
/// local tiers, looked up through the process-wide [`registry`]. Dropping
/// the handle stops the thread.
pub struct InvalidationListener {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl InvalidationListener {
    /// Subscribes to `bus` and spawns the listener thread.
    pub fn spawn(bus: Arc<dyn MessageBus>) -> Self {
        let receiver = bus.subscribe();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = stop.clone();

        let thread = thread::spawn(move || loop {
            if stop_clone.load(Ordering::Relaxed) {
                break;
            }
            match receiver.recv_timeout(POLL_INTERVAL) {
                Ok(notice) => {
                    if let Some(group) = registry::get(&notice.group) {
                        group.evict_local(&notice.key);
                        debug!(group = %notice.group, key = %notice.key, "evicted on bus invalidation");
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        InvalidationListener { stop, thread: Some(thread) }
    }
}

impl Drop for InvalidationListener {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryBus;
    use crate::byteview::ByteView;
    use crate::group::{Getter, Group};
    use meshcache_common::{CacheResult, GroupConfig};
    use std::sync::atomic::AtomicUsize;

    struct CountingGetter(Arc<AtomicUsize>);
    impl Getter for CountingGetter {
        fn load(&self, _key: &str) -> CacheResult<ByteView> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(ByteView::new(b"v"))
        }
    }

    fn unique_name(prefix: &str) -> String {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        format!("{prefix}-{}", COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    #[test]
    fn notice_for_a_registered_group_evicts_its_local_copy() {
        let bus = Arc::new(InMemoryBus::new());
        let name = unique_name("invalidation");
        let calls = Arc::new(AtomicUsize::new(0));
        let group = Group::new(&GroupConfig::new(&name, 4096), Arc::new(CountingGetter(calls.clone())));
        let group = registry::register(group).unwrap();

        group.local_get("k").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let listener = InvalidationListener::spawn(bus.clone());
        bus.publish(crate::bus::Invalidation { group: name.clone(), key: "k".to_string() });
        thread::sleep(Duration::from_millis(300));

        // the main tier was evicted by the listener, so this reload must
        // call the loader again instead of serving the stale copy.
        group.local_get("k").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        drop(listener);
        registry::unregister(&name);
    }

    #[test]
    fn drop_joins_the_thread_without_hanging() {
        let bus = Arc::new(InMemoryBus::new());
        let listener = InvalidationListener::spawn(bus);
        drop(listener);
    }
}
