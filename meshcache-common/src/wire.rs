//! # Peer RPC Wire Format
//!
//! Encodes/decodes the peer RPC request/response record without pulling
//! in a serialization crate: a minimal length-delimited binary framing,
//! one frame per request or response, with no schema negotiation.
//!
//! ## Design Principles
//! 1. **Binary-Safe**: keys/values/group names are raw bytes, no UTF-8
//!    assumption beyond what the caller enforces.
//! 2. **Buffer Reuse**: callers provide the scratch buffer so repeated
//!    requests over one pooled connection stay allocation-light.
//! 3. **Fail Fast**: a truncated or malformed frame is a protocol error,
//!    never a silent short read.
//!
//! ## Frame layout
//!
//! ```text
//! Request:
//! +--------+-------------+-----------+----------------+-----------+-------+
//! | op: 1B | group_len:2B| group: N  | key_len:4B     | key: M    |       |
//! +--------+-------------+-----------+----------------+-----------+-------+
//!
//! Response:
//! +---------+----------------+-----------+
//! | status:1B | payload_len:4B | payload: N |
//! +---------+----------------+-----------+
//! ```
//!
//! Every frame is additionally prefixed on the wire with a 4-byte
//! big-endian total length so `read_frame` knows how much to buffer
//! before parsing.

use std::io::{self, Read, Write};

/// RPC opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Get = 0,
    Remove = 1,
}

impl Op {
    fn from_byte(b: u8) -> Result<Self, WireError> {
        match b {
            0 => Ok(Op::Get),
            1 => Ok(Op::Remove),
            other => Err(WireError::Protocol(format!("unknown opcode {other}"))),
        }
    }
}

/// Decoded peer RPC request: `{group-name, key}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub op: Op,
    pub group: String,
    pub key: String,
}

/// Decoded peer RPC response body.
///
/// `Remove` responses always carry an empty `Ok` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok(Vec<u8>),
    Err(String),
}

/// Errors raised while encoding or decoding a frame.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("io error: {0}")]
    Io(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<io::Error> for WireError {
    fn from(err: io::Error) -> Self {
        WireError::Io(err.to_string())
    }
}

const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

/// Encodes a request into `out`, including the leading 4-byte frame length.
pub fn encode_request(req: &Request, out: &mut Vec<u8>) {
    let mut body = Vec::with_capacity(1 + 2 + req.group.len() + 4 + req.key.len());
    body.push(req.op as u8);
    body.extend_from_slice(&(req.group.len() as u16).to_be_bytes());
    body.extend_from_slice(req.group.as_bytes());
    body.extend_from_slice(&(req.key.len() as u32).to_be_bytes());
    body.extend_from_slice(req.key.as_bytes());

    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&body);
}

/// Encodes a response into `out`, including the leading 4-byte frame length.
pub fn encode_response(resp: &Response, out: &mut Vec<u8>) {
    let mut body = Vec::new();
    match resp {
        Response::Ok(payload) => {
            body.push(0u8);
            body.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            body.extend_from_slice(payload);
        }
        Response::Err(message) => {
            body.push(1u8);
            let bytes = message.as_bytes();
            body.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
            body.extend_from_slice(bytes);
        }
    }

    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&body);
}

/// Reads one length-prefixed frame body from `reader` into a fresh buffer.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, WireError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(WireError::Protocol(format!("frame too large: {len} bytes")));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body)?;
    Ok(body)
}

/// Decodes a request body previously returned by [`read_frame`].
pub fn decode_request(body: &[u8]) -> Result<Request, WireError> {
    let mut cursor = Cursor::new(body);
    let op = Op::from_byte(cursor.read_u8()?)?;
    let group_len = cursor.read_u16()? as usize;
    let group = String::from_utf8(cursor.read_bytes(group_len)?.to_vec())
        .map_err(|e| WireError::Protocol(e.to_string()))?;
    let key_len = cursor.read_u32()? as usize;
    let key = String::from_utf8(cursor.read_bytes(key_len)?.to_vec())
        .map_err(|e| WireError::Protocol(e.to_string()))?;
    Ok(Request { op, group, key })
}

/// Decodes a response body previously returned by [`read_frame`].
pub fn decode_response(body: &[u8]) -> Result<Response, WireError> {
    let mut cursor = Cursor::new(body);
    let status = cursor.read_u8()?;
    let payload_len = cursor.read_u32()? as usize;
    let payload = cursor.read_bytes(payload_len)?.to_vec();
    match status {
        0 => Ok(Response::Ok(payload)),
        1 => {
            let message = String::from_utf8(payload).map_err(|e| WireError::Protocol(e.to_string()))?;
            Ok(Response::Err(message))
        }
        other => Err(WireError::Protocol(format!("unknown status byte {other}"))),
    }
}

/// Writes a pre-encoded frame (including its length prefix) to `writer`.
pub fn write_frame<W: Write>(writer: &mut W, frame: &[u8]) -> Result<(), WireError> {
    writer.write_all(frame)?;
    writer.flush()?;
    Ok(())
}

/// Minimal read-only cursor over a byte slice for frame parsing.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        if self.pos + len > self.data.len() {
            return Err(WireError::Protocol("frame truncated".into()));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, WireError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, WireError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_get_request() {
        let req = Request {
            op: Op::Get,
            group: "scores".to_string(),
            key: "Tom".to_string(),
        };
        let mut buf = Vec::new();
        encode_request(&req, &mut buf);

        let mut reader = &buf[..];
        let body = read_frame(&mut reader).unwrap();
        let decoded = decode_request(&body).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn round_trips_ok_response() {
        let resp = Response::Ok(b"630".to_vec());
        let mut buf = Vec::new();
        encode_response(&resp, &mut buf);

        let mut reader = &buf[..];
        let body = read_frame(&mut reader).unwrap();
        assert_eq!(decode_response(&body).unwrap(), resp);
    }

    #[test]
    fn round_trips_error_response() {
        let resp = Response::Err("no such group".to_string());
        let mut buf = Vec::new();
        encode_response(&resp, &mut buf);

        let mut reader = &buf[..];
        let body = read_frame(&mut reader).unwrap();
        assert_eq!(decode_response(&body).unwrap(), resp);
    }

    #[test]
    fn rejects_oversized_frame() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_FRAME_BYTES + 1).to_be_bytes());
        let mut reader = &buf[..];
        assert!(matches!(read_frame(&mut reader), Err(WireError::Protocol(_))));
    }
}
