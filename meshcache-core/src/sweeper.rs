//! # Background Expiration Sweeper
//!
//! Reclaims expired entries that would otherwise sit in a shard until
//! evicted by budget pressure or a lookup. Runs on its own thread on a
//! fixed interval, stopped via an `AtomicBool` flag rather than a channel
//! so `Drop` can signal it without blocking on a send.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use crate::group::Group;

/// Per-shard scan budget for each sweep pass, so a sweep cannot
/// monopolize a shard's lock.
const SWEEP_BATCH_SIZE: usize = 1024;

/// Owns a background thread that periodically sweeps a [`Group`]'s hot and
/// main tiers for expired entries. Dropping the handle stops the thread.
pub struct SweeperHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Spawns a thread that calls `group.sweep_expired` every `interval`
    /// until the handle is dropped.
    pub fn spawn(group: Arc<Group>, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = stop.clone();

        let thread = thread::spawn(move || {
            while !stop_clone.load(Ordering::Relaxed) {
                thread::sleep(interval);
                if stop_clone.load(Ordering::Relaxed) {
                    break;
                }
                let removed = group.sweep_expired(SWEEP_BATCH_SIZE);
                if removed > 0 {
                    debug!(group = group.name(), removed, "swept expired entries");
                }
            }
        });

        SweeperHandle { stop, thread: Some(thread) }
    }
}

impl Drop for SweeperHandle {
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
    use crate::byteview::ByteView;
    use meshcache_common::{CacheResult, GroupConfig};
    use std::sync::atomic::{AtomicUsize, Ordering as StdOrdering};

    struct NullGetter;
    impl crate::group::Getter for NullGetter {
        fn load(&self, _key: &str) -> CacheResult<ByteView> {
            Ok(ByteView::new(b"v"))
        }
    }

    #[test]
    fn sweeper_reclaims_expired_entries_on_its_own() {
        let mut config = GroupConfig::new("sweep-test", 4096);
        config.main_ttl = Some(Duration::from_millis(5));
        config.shards = 1;
        let group = Arc::new(Group::new(&config, Arc::new(NullGetter)));

        group.get("k").unwrap();
        let handle = SweeperHandle::spawn(group.clone(), Duration::from_millis(10));

        thread::sleep(Duration::from_millis(60));
        drop(handle);

        assert_eq!(group.sweep_expired(SWEEP_BATCH_SIZE), 0, "already swept by the background thread");
    }

    #[test]
    fn drop_joins_the_thread_without_hanging() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = GroupConfig::new("drop-test", 4096);
        let group = Arc::new(Group::new(&config, Arc::new(NullGetter)));
        let _ = calls.load(StdOrdering::Relaxed);

        let handle = SweeperHandle::spawn(group, Duration::from_millis(500));
        drop(handle);
    }
}
