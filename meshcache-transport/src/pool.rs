//! # Peer Connection Pool
//!
//! Reuses TCP connections to a single peer to avoid paying a handshake
//! per RPC: a bounded object pool behind a `Mutex`, returning connections
//! to the pool on drop unless the last use failed.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Keep a bounded set of reusable connections.
//! 2. **Minimal Locking**: Hold the mutex only while moving idle connections.
//! 3. **Fail Fast**: Exceeding the pool limit returns an error immediately.
//! 4. **Cache-Friendly Buffers**: Each connection reuses its own buffers.

use std::collections::VecDeque;
use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use meshcache_common::wire::{self, Request, Response};
use meshcache_common::{CacheError, CacheResult};

/// Pool configuration for one peer connection.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Peer address, e.g. "127.0.0.1:7000".
    pub addr: String,
    /// Maximum number of idle connections to keep.
    pub max_idle: usize,
    /// Maximum total connections (idle + in-use).
    pub max_total: usize,
    /// Bounded RPC deadline applied to connect, read, and write.
    pub deadline: Duration,
}

impl PoolConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        PoolConfig {
            addr: addr.into(),
            max_idle: 8,
            max_total: 16,
            deadline: meshcache_common::DEFAULT_PEER_DEADLINE,
        }
    }
}

struct PoolState {
    idle: VecDeque<Connection>,
    total: usize,
}

struct PoolInner {
    config: PoolConfig,
    state: Mutex<PoolState>,
}

/// Connection pool handle for a single remote peer.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Self {
        let state = PoolState { idle: VecDeque::with_capacity(config.max_idle), total: 0 };
        ConnectionPool { inner: Arc::new(PoolInner { config, state: Mutex::new(state) }) }
    }

    /// Acquires a connection, connecting fresh if none are idle and the
    /// pool has room.
    pub fn acquire(&self) -> CacheResult<PooledConnection> {
        if let Some(conn) = self.pop_idle() {
            return Ok(PooledConnection::new(self.inner.clone(), conn));
        }

        if !self.try_reserve() {
            return Err(CacheError::transport("peer connection pool exhausted"));
        }

        match Connection::connect(&self.inner.config) {
            Ok(conn) => Ok(PooledConnection::new(self.inner.clone(), conn)),
            Err(err) => {
                self.release_slot();
                Err(err)
            }
        }
    }

    fn pop_idle(&self) -> Option<Connection> {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        state.idle.pop_front()
    }

    fn try_reserve(&self) -> bool {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        if state.total >= self.inner.config.max_total {
            return false;
        }
        state.total += 1;
        true
    }

    fn release_slot(&self) {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        state.total = state.total.saturating_sub(1);
    }

    fn return_connection(&self, conn: Connection) {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        if state.idle.len() < self.inner.config.max_idle {
            state.idle.push_back(conn);
        } else {
            state.total = state.total.saturating_sub(1);
        }
    }
}

/// RAII wrapper returning a connection to the pool on drop, unless its
/// last RPC failed.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    conn: Option<Connection>,
    valid: bool,
}

impl PooledConnection {
    fn new(pool: Arc<PoolInner>, conn: Connection) -> Self {
        PooledConnection { pool, conn: Some(conn), valid: true }
    }

    /// Sends `request` and returns the decoded response.
    pub fn exec(&mut self, request: &Request) -> CacheResult<Response> {
        let conn = self.conn.as_mut().expect("connection exists");
        let response = conn.exec(request);
        if response.is_err() {
            self.valid = false;
        }
        response
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => return,
        };

        let pool = ConnectionPool { inner: self.pool.clone() };
        if self.valid {
            pool.return_connection(conn);
        } else {
            pool.release_slot();
        }
    }
}

/// A single TCP connection to a peer.
struct Connection {
    stream: TcpStream,
    write_buf: Vec<u8>,
}

impl Connection {
    fn connect(config: &PoolConfig) -> CacheResult<Self> {
        let addr: SocketAddr =
            config.addr.parse().map_err(|_| CacheError::transport("invalid peer address"))?;
        let stream = TcpStream::connect_timeout(&addr, config.deadline)
            .map_err(|err| CacheError::transport(format!("connect failed: {err}")))?;
        stream
            .set_read_timeout(Some(config.deadline))
            .map_err(|err| CacheError::transport(err.to_string()))?;
        stream
            .set_write_timeout(Some(config.deadline))
            .map_err(|err| CacheError::transport(err.to_string()))?;
        stream.set_nodelay(true).map_err(|err| CacheError::transport(err.to_string()))?;

        Ok(Connection { stream, write_buf: Vec::with_capacity(256) })
    }

    fn exec(&mut self, request: &Request) -> CacheResult<Response> {
        self.write_buf.clear();
        wire::encode_request(request, &mut self.write_buf);

        self.stream
            .write_all(&self.write_buf)
            .map_err(|err| CacheError::transport(format!("write failed: {err}")))?;

        let frame = wire::read_frame(&mut self.stream)
            .map_err(|err| CacheError::transport(format!("read failed: {err}")))?;
        wire::decode_response(&frame).map_err(|err| CacheError::transport(err.to_string()))
    }
}
