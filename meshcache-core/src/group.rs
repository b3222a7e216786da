//! # Group
//!
//! The top-level handle an application holds — a named cache with a hot
//! tier, a sharded main tier, an origin loader, and optional
//! peer/central/bus collaborators. Built as a builder over trait objects
//! rather than generics, since a `Group`'s central store, peer picker, and
//! invalidation mode are each independently optional and swapped out per
//! deployment rather than per call site.

use std::sync::Arc;
use std::time::Duration;

use meshcache_common::{CacheError, CacheResult, GroupConfig};
use tracing::{debug, warn};

use crate::bus::{Invalidation, MessageBus};
use crate::byteview::ByteView;
use crate::sharded::ShardedCache;
use crate::singleflight::SingleFlight;

/// Loads a key from the system of record when no tier holds it.
pub trait Getter: Send + Sync {
    fn load(&self, key: &str) -> CacheResult<ByteView>;
}

/// Adapts a plain closure into a [`Getter`] so callers don't need a
/// one-off struct for a simple loader.
pub struct GetterFn<F>(F);

impl<F> GetterFn<F>
where
    F: Fn(&str) -> CacheResult<ByteView> + Send + Sync,
{
    pub fn new(load: F) -> Self {
        GetterFn(load)
    }
}

impl<F> Getter for GetterFn<F>
where
    F: Fn(&str) -> CacheResult<ByteView> + Send + Sync,
{
    fn load(&self, key: &str) -> CacheResult<ByteView> {
        (self.0)(key)
    }
}

/// The origin a write is applied to. Independent of [`CentralCache`]
/// because a group can be wired with only one of the two — a read-through
/// L3 store with no writable origin, or a writable origin with no L3
/// layer in front of the loader.
pub trait Setter: Send + Sync {
    fn set(&self, key: &str, value: &ByteView) -> CacheResult<()>;
}

/// Default setter for groups with no writable origin: every write is
/// rejected rather than silently dropped.
pub struct NoOpSetter;

impl Setter for NoOpSetter {
    fn set(&self, _key: &str, _value: &ByteView) -> CacheResult<()> {
        Err(CacheError::validation("group has no setter configured"))
    }
}

/// A read-through L3 store consulted between the main tier and the
/// loader, populated best-effort on a loader hit or a write, and the
/// target of an explicit delete on `remove`.
pub trait CentralCache: Send + Sync {
    /// Reads `key`. `Ok(None)` means the store has nothing for it, which
    /// is distinct from `Err`, which means the store itself failed.
    fn get(&self, key: &str) -> CacheResult<Option<ByteView>>;
    fn store(&self, key: &str, value: &ByteView) -> CacheResult<()>;
    fn delete(&self, key: &str) -> CacheResult<()>;
}

/// A remote group member reachable over peer RPC.
pub trait PeerClient: Send + Sync {
    fn get(&self, group: &str, key: &str) -> CacheResult<ByteView>;
    fn remove(&self, group: &str, key: &str) -> CacheResult<()>;
}

/// Selects which peer owns a key and enumerates the full peer set for
/// fan-out invalidation.
pub trait PeerPicker: Send + Sync {
    /// Returns the remote peer that owns `key`, or `None` if this node
    /// owns it (no RPC needed).
    fn pick_owner(&self, key: &str) -> Option<Arc<dyn PeerClient>>;

    /// Every peer currently known, for invalidation fan-out.
    fn all_peers(&self) -> Vec<Arc<dyn PeerClient>>;
}

/// How a `set`/`remove` is propagated to the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    /// The origin write completes before `set` returns.
    WriteThrough,
    /// The local tiers are updated first; the origin write happens after
    /// and its failure is logged, not surfaced to the caller.
    WriteBack,
}

/// How a write's invalidation is propagated to the rest of the cluster.
/// A group without peers configured uses `None`.
pub enum InvalidationMode {
    None,
    Bus(Arc<dyn MessageBus>),
    PeerFanOut,
}

/// A named, tiered cache.
pub struct Group {
    name: String,
    hot: ShardedCache,
    main: ShardedCache,
    hot_ttl: Duration,
    main_ttl: Duration,
    getter: Arc<dyn Getter>,
    setter: Option<Arc<dyn Setter>>,
    central: Option<Arc<dyn CentralCache>>,
    peers: Option<Arc<dyn PeerPicker>>,
    invalidation: InvalidationMode,
    write_strategy: WriteStrategy,
    flight: SingleFlight,
}

impl Group {
    /// Builds a group from `config` and a mandatory loader. Peers,
    /// setter, central store, and invalidation mode default to none and
    /// are attached with the `with_*` builder methods.
    pub fn new(config: &GroupConfig, getter: Arc<dyn Getter>) -> Self {
        Group {
            name: config.name.clone(),
            hot: ShardedCache::new(config.shards, config.hot_bytes()),
            main: ShardedCache::new(config.shards, config.max_bytes),
            hot_ttl: config.hot_ttl,
            main_ttl: config.main_ttl.unwrap_or(Duration::ZERO),
            getter,
            setter: None,
            central: None,
            peers: None,
            invalidation: InvalidationMode::None,
            write_strategy: WriteStrategy::WriteThrough,
            flight: SingleFlight::new(),
        }
    }

    pub fn with_setter(mut self, setter: Arc<dyn Setter>) -> Self {
        self.setter = Some(setter);
        self
    }

    pub fn with_central(mut self, central: Arc<dyn CentralCache>) -> Self {
        self.central = Some(central);
        self
    }

    pub fn with_peers(mut self, peers: Arc<dyn PeerPicker>) -> Self {
        self.peers = Some(peers);
        self
    }

    pub fn with_invalidation(mut self, mode: InvalidationMode) -> Self {
        self.invalidation = mode;
        self
    }

    pub fn with_write_strategy(mut self, strategy: WriteStrategy) -> Self {
        self.write_strategy = strategy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads `key`, checking hot, then main, then (if this node doesn't
    /// own the key) the owning peer, then the central store, falling back
    /// to the loader.
    pub fn get(&self, key: &str) -> CacheResult<ByteView> {
        if key.is_empty() {
            return Err(CacheError::validation("key must not be empty"));
        }

        if let Some(value) = self.hot.get(key) {
            return Ok(value);
        }
        if let Some(value) = self.main.get(key) {
            return Ok(value);
        }

        self.flight.do_call(key, || self.load_missing(key))
    }

    fn load_missing(&self, key: &str) -> CacheResult<ByteView> {
        if let Some(peers) = &self.peers {
            if let Some(owner) = peers.pick_owner(key) {
                match owner.get(&self.name, key) {
                    Ok(value) => {
                        self.hot.add(key, value.clone(), self.hot_ttl);
                        return Ok(value);
                    }
                    Err(err) if err.is_transport() => {
                        warn!(group = %self.name, %key, error = %err, "peer read failed, falling back to local load");
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        self.load_into_main(key)
    }

    /// Populates only local tiers, bypassing the loader and peer picker.
    /// This is what the RPC server calls on behalf of a remote peer,
    /// since re-routing a peer's own request back through `pick_owner`
    /// would loop.
    pub fn local_get(&self, key: &str) -> CacheResult<ByteView> {
        if let Some(value) = self.main.get(key) {
            return Ok(value);
        }
        self.flight.do_call(key, || self.load_into_main(key))
    }

    /// Reads the central store, falling back to the loader on a miss or
    /// store failure. A loader hit is written back into the central store
    /// (best-effort) before populating the main tier, so the next miss
    /// elsewhere in the cluster can be served from L3 instead of the
    /// origin again.
    fn load_into_main(&self, key: &str) -> CacheResult<ByteView> {
        if let Some(central) = &self.central {
            match central.get(key) {
                Ok(Some(value)) => {
                    self.main.add(key, value.clone(), self.main_ttl);
                    return Ok(value);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(group = %self.name, %key, error = %err, "central store read failed, falling back to loader");
                }
            }
        }

        let value = self.getter.load(key)?;
        if let Some(central) = &self.central {
            if let Err(err) = central.store(key, &value) {
                warn!(group = %self.name, %key, error = %err, "populating central store after a loader hit failed");
            }
        }
        self.main.add(key, value.clone(), self.main_ttl);
        Ok(value)
    }

    /// Writes `key` = `value`, applying the configured [`WriteStrategy`]
    /// and invalidation mode.
    ///
    /// Write-through aborts and surfaces the error if the origin write
    /// fails; write-back populates the local tiers first and only logs an
    /// origin-write failure, since the caller has already been told the
    /// write succeeded. Either way, a central-store write is always
    /// best-effort: it is a populated-from-origin cache, not the origin
    /// itself.
    pub fn set(&self, key: &str, value: ByteView) -> CacheResult<()> {
        if key.is_empty() {
            return Err(CacheError::validation("key must not be empty"));
        }
        let setter = self
            .setter
            .as_ref()
            .ok_or_else(|| CacheError::validation("group has no setter configured"))?;

        match self.write_strategy {
            WriteStrategy::WriteThrough => {
                setter.set(key, &value)?;
                self.store_central_best_effort(key, &value);
                self.apply_local_write(key, value);
                self.broadcast_invalidation(key);
            }
            WriteStrategy::WriteBack => {
                self.apply_local_write(key, value.clone());
                match setter.set(key, &value) {
                    Ok(()) => {
                        self.store_central_best_effort(key, &value);
                        self.broadcast_invalidation(key);
                    }
                    Err(err) => {
                        warn!(group = %self.name, %key, error = %err, "write-back to origin failed");
                    }
                }
            }
        }

        Ok(())
    }

    fn store_central_best_effort(&self, key: &str, value: &ByteView) {
        if let Some(central) = &self.central {
            if let Err(err) = central.store(key, value) {
                warn!(group = %self.name, %key, error = %err, "central store write failed");
            }
        }
    }

    /// Removes `key` from every local tier, the central store, and the
    /// rest of the cluster.
    pub fn remove(&self, key: &str) -> CacheResult<()> {
        self.local_remove(key)?;
        self.broadcast_invalidation(key);
        Ok(())
    }

    /// Removes `key` from local tiers and the central store only, without
    /// notifying the rest of the cluster. Used by the RPC server so a
    /// remote peer's remove doesn't re-trigger fan-out back across the
    /// ring, and by the bus-invalidation listener reacting to a notice
    /// another node already originated.
    pub fn local_remove(&self, key: &str) -> CacheResult<()> {
        if key.is_empty() {
            return Err(CacheError::validation("key must not be empty"));
        }
        self.evict_local(key);
        if let Some(central) = &self.central {
            if let Err(err) = central.delete(key) {
                warn!(group = %self.name, %key, error = %err, "central store delete failed");
            }
        }
        Ok(())
    }

    /// Drops `key` from the hot and main tiers only — no central store,
    /// no broadcast.
    pub(crate) fn evict_local(&self, key: &str) {
        self.hot.remove(key);
        self.main.remove(key);
    }

    fn apply_local_write(&self, key: &str, value: ByteView) {
        self.hot.remove(key);
        self.main.add(key, value, self.main_ttl);
    }

    fn broadcast_invalidation(&self, key: &str) {
        match &self.invalidation {
            InvalidationMode::None => {}
            InvalidationMode::Bus(bus) => {
                bus.publish(Invalidation { group: self.name.clone(), key: key.to_string() });
            }
            InvalidationMode::PeerFanOut => {
                if let Some(peers) = &self.peers {
                    for peer in peers.all_peers() {
                        if let Err(err) = peer.remove(&self.name, key) {
                            debug!(group = %self.name, %key, error = %err, "peer invalidation failed");
                        }
                    }
                }
            }
        }
    }

    /// Periodic expiration sweep over both tiers, called by
    /// [`crate::sweeper::SweeperHandle`].
    pub fn sweep_expired(&self, per_shard_budget: usize) -> usize {
        self.hot.remove_expired(per_shard_budget) + self.main.remove_expired(per_shard_budget)
    }
}
