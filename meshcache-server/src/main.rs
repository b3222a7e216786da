//! Peer RPC server binary. Binds a TCP listener and dispatches into
//! whatever groups have already been registered via
//! `meshcache_core::registry` by the embedding application's startup code.

use std::sync::Arc;

use anyhow::Context;
use meshcache_server::Metrics;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let addr = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:7000".to_string());
    let metrics = Arc::new(Metrics::new());

    meshcache_server::run(&addr, metrics)
        .await
        .with_context(|| format!("peer RPC server failed on {addr}"))
}
