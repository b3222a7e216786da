//! # Peer RPC Client
//!
//! A compact, blocking client for the two peer RPCs a group needs from a
//! remote owner — `Get` and `Remove`: a thin facade over a connection
//! pool, one `acquire`-`exec`-return per call.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `TcpPeerClient` hides pooling and framing details.
//! 2. **Fail Fast**: transport failures surface immediately as
//!    `CacheError::Transport`, which a `Group` always treats as
//!    recoverable (fall back to a local load), never propagates further.

use meshcache_common::wire::{Op, Request, Response};
use meshcache_common::{CacheError, CacheResult};
use meshcache_core::{ByteView, PeerClient};

use crate::pool::{ConnectionPool, PoolConfig};

/// A peer reachable over TCP, speaking the binary peer RPC wire format.
pub struct TcpPeerClient {
    pool: ConnectionPool,
}

impl TcpPeerClient {
    /// Creates a client pointed at `addr` with the default pool sizing and
    /// the default peer RPC deadline.
    pub fn connect(addr: impl Into<String>) -> Self {
        Self::with_config(PoolConfig::new(addr))
    }

    pub fn with_config(config: PoolConfig) -> Self {
        TcpPeerClient { pool: ConnectionPool::new(config) }
    }
}

impl PeerClient for TcpPeerClient {
    fn get(&self, group: &str, key: &str) -> CacheResult<ByteView> {
        let mut conn = self.pool.acquire()?;
        let request = Request { op: Op::Get, group: group.to_string(), key: key.to_string() };
        match conn.exec(&request)? {
            Response::Ok(payload) => Ok(ByteView::from(payload)),
            Response::Err(message) => Err(CacheError::upstream(message)),
        }
    }

    fn remove(&self, group: &str, key: &str) -> CacheResult<()> {
        let mut conn = self.pool.acquire()?;
        let request = Request { op: Op::Remove, group: group.to_string(), key: key.to_string() };
        match conn.exec(&request)? {
            Response::Ok(_) => Ok(()),
            Response::Err(message) => Err(CacheError::upstream(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshcache_common::wire;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn spawn_echo_server(respond: impl Fn(Request) -> Response + Send + 'static) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let frame = wire::read_frame(&mut stream).unwrap();
                let request = wire::decode_request(&frame).unwrap();
                let response = respond(request);
                let mut out = Vec::new();
                wire::encode_response(&response, &mut out);
                stream.write_all(&out).unwrap();
                let _ = stream.flush();
                let _ = stream.read(&mut [0u8; 1]);
            }
        });
        addr
    }

    #[test]
    fn get_decodes_ok_payload_into_a_byte_view() {
        let addr = spawn_echo_server(|_req| Response::Ok(b"630".to_vec()));
        let client = TcpPeerClient::connect(addr);
        let value = client.get("scores", "Tom").unwrap();
        assert_eq!(value, ByteView::new(b"630"));
    }

    #[test]
    fn get_surfaces_server_error_as_upstream() {
        let addr = spawn_echo_server(|_req| Response::Err("no such group".to_string()));
        let client = TcpPeerClient::connect(addr);
        assert!(matches!(client.get("scores", "Tom"), Err(CacheError::Upstream(_))));
    }

    #[test]
    fn remove_acknowledges_ok() {
        let addr = spawn_echo_server(|_req| Response::Ok(Vec::new()));
        let client = TcpPeerClient::connect(addr);
        assert!(client.remove("scores", "Tom").is_ok());
    }

    #[test]
    fn connect_failure_surfaces_as_transport_error() {
        let client = TcpPeerClient::connect("127.0.0.1:1");
        assert!(matches!(client.get("scores", "Tom"), Err(CacheError::Transport(_))));
    }
}
