//! # meshcache-core
//!
//! The sharded, TTL-aware cache engine: byte storage, shard routing,
//! single-flight load deduplication, the consistent hash ring, the
//! message bus, and the `Group` read/write path that ties them together.

pub mod bus;
pub mod byteview;
pub mod front_cache;
pub mod group;
pub mod invalidation;
pub mod picker;
pub mod registry;
pub mod ring;
pub mod shard;
pub mod sharded;
pub mod singleflight;
pub mod sweeper;

pub use bus::{InMemoryBus, Invalidation, MessageBus};
pub use byteview::ByteView;
pub use front_cache::FrontCache;
pub use group::{
    CentralCache, Getter, GetterFn, Group, InvalidationMode, NoOpSetter, PeerClient, PeerPicker,
    Setter, WriteStrategy,
};
pub use invalidation::InvalidationListener;
pub use picker::RingPeerPicker;
pub use ring::HashRing;
pub use sharded::ShardedCache;
pub use singleflight::SingleFlight;
pub use sweeper::SweeperHandle;
