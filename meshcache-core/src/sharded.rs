//! # Sharded Cache
//!
//! Routes keys across a fixed number of independently locked [`Shard`]s,
//! so lookups for unrelated keys don't contend on the same lock. Routing
//! uses a fixed FNV-1a-32 hash rather than a randomly seeded one, so the
//! same key lands on the same shard across runs and processes — needed
//! for expiration sweeps and tests to behave deterministically.

use std::time::Duration;

use parking_lot::RwLock;

use crate::byteview::ByteView;
use crate::shard::{EvictObserver, Shard};

/// FNV-1a-32 offset basis.
const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
/// FNV-1a-32 prime.
const FNV_PRIME: u32 = 0x0100_0193;

/// Deterministic shard-routing hash.
pub fn fnv1a_32(key: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in key.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// A fixed number of independently locked [`Shard`]s addressed by
/// [`fnv1a_32`].
pub struct ShardedCache {
    shards: Vec<RwLock<Shard>>,
}

impl ShardedCache {
    /// Builds `count` shards, each budgeted `total_bytes / count` (floored
    /// at [`crate::MIN_SHARD_BUDGET_BYTES`]).
    pub fn new(count: usize, total_bytes: u64) -> Self {
        assert!(count > 0, "a sharded cache needs at least one shard");
        let per_shard = std::cmp::max(
            (total_bytes / count as u64) as usize,
            meshcache_common::MIN_SHARD_BUDGET_BYTES,
        );
        let shards = (0..count).map(|_| RwLock::new(Shard::new(per_shard))).collect();
        ShardedCache { shards }
    }

    fn shard_for(&self, key: &str) -> &RwLock<Shard> {
        let idx = (fnv1a_32(key) as usize) % self.shards.len();
        &self.shards[idx]
    }

    /// Registers an eviction observer on every shard. Must be called
    /// before any entries are added; a shard already holding data keeps
    /// whatever observer was set at construction time.
    pub fn set_on_evict(&self, make_observer: impl Fn() -> EvictObserver) {
        for shard in &self.shards {
            shard.write().set_on_evict(make_observer());
        }
    }

    pub fn get(&self, key: &str) -> Option<ByteView> {
        self.shard_for(key).write().get(key)
    }

    pub fn add(&self, key: &str, value: ByteView, ttl: Duration) {
        self.shard_for(key).write().add(key, value, ttl);
    }

    pub fn remove(&self, key: &str) {
        self.shard_for(key).write().remove(key);
    }

    /// Sweeps every shard for expired entries, each shard bounded
    /// independently by `per_shard_budget`.
    pub fn remove_expired(&self, per_shard_budget: usize) -> usize {
        self.shards.iter().map(|shard| shard.write().remove_expired(per_shard_budget)).sum()
    }

    /// Total bytes tracked across all shards.
    pub fn bytes(&self) -> u64 {
        self.shards.iter().map(|shard| shard.read().bytes() as u64).sum()
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_is_deterministic() {
        let first = fnv1a_32("alice");
        let second = fnv1a_32("alice");
        assert_eq!(first, second);
    }

    #[test]
    fn distinct_keys_can_land_on_distinct_shards() {
        let cache = ShardedCache::new(4, 4096);
        for i in 0..100 {
            cache.add(&format!("key-{i}"), ByteView::new(b"v"), Duration::ZERO);
        }
        // with 100 keys over 4 shards, every shard should hold at least one.
        assert_eq!(cache.len(), 100);
    }

    #[test]
    fn add_get_remove_roundtrip() {
        let cache = ShardedCache::new(8, 4096);
        cache.add("k", ByteView::new(b"v"), Duration::ZERO);
        assert_eq!(cache.get("k"), Some(ByteView::new(b"v")));
        cache.remove("k");
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn per_shard_budget_is_floored_to_minimum() {
        let cache = ShardedCache::new(256, 100);
        for shard in &cache.shards {
            assert_eq!(shard.read().budget(), meshcache_common::MIN_SHARD_BUDGET_BYTES);
        }
    }
}
