//! # meshcache-common
//!
//! Shared error types, the peer RPC wire format, and group configuration
//! options used by both the transport client and the RPC server.

mod config;
mod error;
pub mod wire;

pub use config::{
    GroupConfig, DEFAULT_CLEANUP_INTERVAL, DEFAULT_HOT_TTL, DEFAULT_PEER_DEADLINE,
    DEFAULT_RING_REPLICAS, DEFAULT_SHARDS, MIN_SHARD_BUDGET_BYTES,
};
pub use error::{CacheError, CacheResult};
