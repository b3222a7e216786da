//! # Peer RPC Server
//!
//! Accepts peer RPC connections, decodes the binary wire frame, and
//! dispatches `Get`/`Remove` to the locally registered group: a `BytesMut`
//! read buffer over a `tokio::net::TcpStream`, one handler function per
//! opcode, encoding the reply inline rather than building an intermediate
//! response object.

use std::time::Instant;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use meshcache_common::wire::{self, Op, Request, Response};
use meshcache_common::CacheError;
use meshcache_core::registry;

use crate::metrics::Metrics;

/// Binds `addr` and serves peer RPC connections until the process is
/// killed. Each connection is handled on its own task.
pub async fn run(addr: &str, metrics: std::sync::Arc<Metrics>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "peer rpc server listening");

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let metrics = metrics.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, &metrics).await {
                warn!(%peer_addr, error = %err, "peer connection ended with an error");
            }
        });
    }
}

/// Handles one peer connection: reads length-delimited frames until the
/// peer closes the socket or sends a malformed frame.
pub async fn handle_connection(mut stream: TcpStream, metrics: &Metrics) -> std::io::Result<()> {
    let mut buffer = BytesMut::with_capacity(8 * 1024);

    loop {
        let body = match read_frame(&mut stream, &mut buffer).await? {
            Some(body) => body,
            None => return Ok(()),
        };

        metrics.record_request_start();
        let started = Instant::now();

        let response = match wire::decode_request(&body) {
            Ok(request) => dispatch(request),
            Err(err) => Response::Err(format!("malformed request: {err}")),
        };

        if matches!(response, Response::Err(_)) {
            metrics.record_error();
        }
        metrics.record_request_end(started.elapsed());

        let mut out = Vec::new();
        wire::encode_response(&response, &mut out);
        stream.write_all(&out).await?;
    }
}

/// Reads one length-prefixed frame body, or `None` on a clean EOF before
/// any bytes of a new frame arrive.
async fn read_frame(stream: &mut TcpStream, buffer: &mut BytesMut) -> std::io::Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match read_exact_or_eof(stream, &mut len_buf).await? {
        false => return Ok(None),
        true => {}
    }
    let len = u32::from_be_bytes(len_buf) as usize;

    buffer.clear();
    buffer.resize(len, 0);
    stream.read_exact(buffer).await?;
    Ok(Some(buffer.to_vec()))
}

/// Like `read_exact`, but returns `Ok(false)` instead of erroring when the
/// peer closes the connection before writing any bytes of this frame.
async fn read_exact_or_eof(stream: &mut TcpStream, buf: &mut [u8]) -> std::io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed mid-frame",
            ));
        }
        filled += n;
    }
    Ok(true)
}

/// Both operations dispatch to the `local_*` half of `Group`'s API: a
/// request arriving over this socket already *is* the peer-routing
/// decision another node made, so re-entering `pick_owner` on `Get` or
/// re-broadcasting on `Remove` would risk a routing loop back across the
/// ring.
fn dispatch(request: Request) -> Response {
    let group = match registry::get(&request.group) {
        Some(group) => group,
        None => return Response::Err(format!("unknown group {:?}", request.group)),
    };

    match request.op {
        Op::Get => match group.local_get(&request.key) {
            Ok(value) => Response::Ok(value.to_vec()),
            Err(CacheError::NotFound) => Response::Err("key not found".to_string()),
            Err(err) => Response::Err(err.to_string()),
        },
        Op::Remove => match group.local_remove(&request.key) {
            Ok(()) => Response::Ok(Vec::new()),
            Err(err) => Response::Err(err.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshcache_common::GroupConfig;
    use meshcache_core::{CacheResult, ByteView, Getter, Group};
    use std::sync::Arc;

    struct StaticGetter;
    impl Getter for StaticGetter {
        fn load(&self, _key: &str) -> CacheResult<ByteView> {
            Ok(ByteView::new(b"630"))
        }
    }

    fn register_unique_group(prefix: &str) -> String {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let name = format!("{prefix}-{}", COUNTER.fetch_add(1, Ordering::SeqCst));
        let group = Group::new(&GroupConfig::new(&name, 4096), Arc::new(StaticGetter));
        registry::register(group).unwrap();
        name
    }

    #[test]
    fn dispatch_get_hits_registered_group() {
        let name = register_unique_group("server-get");
        let request = Request { op: Op::Get, group: name, key: "Tom".to_string() };
        assert_eq!(dispatch(request), Response::Ok(b"630".to_vec()));
    }

    #[test]
    fn dispatch_get_on_unknown_group_is_an_error() {
        let request = Request { op: Op::Get, group: "does-not-exist".to_string(), key: "k".to_string() };
        assert!(matches!(dispatch(request), Response::Err(_)));
    }

    #[test]
    fn dispatch_remove_acknowledges_even_when_absent() {
        let name = register_unique_group("server-remove");
        let request = Request { op: Op::Remove, group: name, key: "missing".to_string() };
        assert_eq!(dispatch(request), Response::Ok(Vec::new()));
    }
}
