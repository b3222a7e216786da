//! # Group Configuration
//!
//! Holds the enumerated, serializable options recognized at group
//! creation. Trait-object collaborators (loader, central store, peer
//! picker, message bus) are wired up by the caller through `Group`'s
//! builder methods — they cannot be expressed in a config file — but
//! everything that *can* be serialized lives here so a node can describe
//! its groups in TOML/JSON at startup.
//!
//! ## Design Principles
//! 1. **Builder Defaults**: a `Default` impl with sensible reference
//!    values, overridden field-by-field.
//! 2. **Serializable**: derives `serde::Deserialize` so config files can be
//!    loaded without hand-written parsing.

use std::time::Duration;

use serde::Deserialize;

/// Default hot-tier TTL.
pub const DEFAULT_HOT_TTL: Duration = Duration::from_secs(5);

/// Default periodic sweep interval.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(10);

/// Default shard fan-out.
pub const DEFAULT_SHARDS: usize = 256;

/// Default virtual nodes per physical peer in the hash ring.
pub const DEFAULT_RING_REPLICAS: usize = 50;

/// Default peer RPC deadline.
pub const DEFAULT_PEER_DEADLINE: Duration = Duration::from_millis(500);

/// Minimum per-shard byte budget; a shard is never sized below this even
/// when `max_bytes` is split thin across many shards.
pub const MIN_SHARD_BUDGET_BYTES: usize = 1024;

/// Enumerated, serializable group options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    /// Required, unique per process.
    pub name: String,
    /// Total byte budget shared across the sharded main tier; the hot tier
    /// is sized to 1/8th of this.
    pub max_bytes: u64,
    /// TTL applied to entries populated in the main tier. `None` means no
    /// expiry by TTL, the default.
    #[serde(with = "duration_secs_opt")]
    pub main_ttl: Option<Duration>,
    /// TTL applied to entries populated in the hot tier from a peer read.
    #[serde(with = "duration_secs")]
    pub hot_ttl: Duration,
    /// Interval between background expiration sweeps.
    #[serde(with = "duration_secs")]
    pub cleanup_interval: Duration,
    /// Number of shards backing each sharded cache.
    pub shards: usize,
    /// Virtual nodes per physical peer in the consistent hash ring.
    pub ring_replicas: usize,
}

impl Default for GroupConfig {
    fn default() -> Self {
        GroupConfig {
            name: String::new(),
            max_bytes: 0,
            main_ttl: None,
            hot_ttl: DEFAULT_HOT_TTL,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            shards: DEFAULT_SHARDS,
            ring_replicas: DEFAULT_RING_REPLICAS,
        }
    }
}

impl GroupConfig {
    /// Creates a config with the given name and byte budget, all other
    /// fields at their defaults.
    pub fn new(name: impl Into<String>, max_bytes: u64) -> Self {
        GroupConfig {
            name: name.into(),
            max_bytes,
            ..Default::default()
        }
    }

    /// Byte budget for the hot tier: 1/8th of `max_bytes`.
    pub fn hot_bytes(&self) -> u64 {
        self.max_bytes / 8
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

mod duration_secs_opt {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<u64> = Option::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
