//! # meshcache-server
//!
//! The peer RPC frontend: accepts TCP connections speaking
//! `meshcache_common::wire` and dispatches `Get`/`Remove` into whichever
//! groups the embedding application has registered with
//! `meshcache_core::registry`.

pub mod metrics;
pub mod server;

pub use metrics::{Metrics, MetricsSnapshot};
pub use server::{handle_connection, run};
