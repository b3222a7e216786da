//! # meshcache-transport
//!
//! A blocking, connection-pooled peer RPC client, speaking the binary
//! wire format defined in `meshcache_common::wire`.

mod client;
mod pool;

pub use client::TcpPeerClient;
pub use pool::{ConnectionPool, PoolConfig};
