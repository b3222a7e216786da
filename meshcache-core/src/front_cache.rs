//! # Front Cache
//!
//! A small, short-TTL cache a thin client holds in front of a whole
//! [`Group`], absorbing repeat reads and writes for the same key without a
//! round trip through the group's own tiers or over peer RPC. Reuses
//! [`crate::shard::Shard`] directly rather than reimplementing an LRU,
//! since a front cache is exactly a single unsharded instance of the same
//! structure with its own, usually shorter, TTL.

use std::sync::Arc;
use std::time::Duration;

use meshcache_common::CacheResult;
use parking_lot::Mutex;

use crate::byteview::ByteView;
use crate::group::Group;
use crate::shard::Shard;

/// Wraps an `Arc<Group>` with a local, short-TTL absorption cache. Meant
/// to live on a client process, not inside the cluster itself.
pub struct FrontCache {
    group: Arc<Group>,
    shard: Mutex<Shard>,
    ttl: Duration,
}

impl FrontCache {
    /// Builds a front cache over `group`, bounded by `max_bytes` with
    /// every locally absorbed entry expiring after `ttl`.
    pub fn new(group: Arc<Group>, max_bytes: u64, ttl: Duration) -> Self {
        FrontCache { group, shard: Mutex::new(Shard::new(max_bytes as usize)), ttl }
    }

    /// Serves `key` from the local shard if present, otherwise reads
    /// through the wrapped group and caches the result locally.
    pub fn get(&self, key: &str) -> CacheResult<ByteView> {
        if let Some(value) = self.shard.lock().get(key) {
            return Ok(value);
        }
        let value = self.group.get(key)?;
        self.shard.lock().add(key, value.clone(), self.ttl);
        Ok(value)
    }

    /// Writes through the wrapped group, then refreshes the local copy so
    /// a read immediately after sees the new value without round-tripping
    /// back through the group.
    pub fn set(&self, key: &str, value: ByteView) -> CacheResult<()> {
        self.group.set(key, value.clone())?;
        self.shard.lock().add(key, value, self.ttl);
        Ok(())
    }

    /// Removes `key` locally and through the wrapped group.
    pub fn remove(&self, key: &str) -> CacheResult<()> {
        self.shard.lock().remove(key);
        self.group.remove(key)
    }
}
