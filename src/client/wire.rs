//! Wire codec for the TCP client
//!
//! Client side of a simple binary protocol exposing the backend
//! capabilities the engine consumes.
//!
//! ## Request Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Op (1)   │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Operations
//! - 0x01: PING      - Payload: empty
//! - 0x02: SELECT    - Payload: db (4)
//! - 0x03: KEYS      - Payload: empty
//! - 0x04: DBSIZE    - Payload: empty
//! - 0x05: KIND      - Payload: key_len (4) + key
//! - 0x06: READ      - Payload: key_len (4) + key
//! - 0x07: WRITE     - Payload: key_len (4) + key + value
//! - 0x08: DELETE    - Payload: key_len (4) + key
//! - 0x09: TTL       - Payload: key_len (4) + key
//! - 0x0A: EXPIRE    - Payload: key_len (4) + key + seconds (8)
//! - 0x0B: FLUSHDB   - Payload: empty
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Status Codes
//! - 0x00: OK        - Payload depends on the request
//! - 0x01: NOT_FOUND - Payload: empty
//! - 0x02: ERROR     - Payload: UTF-8 message
//!
//! Values travel as a one-byte kind tag followed by length-prefixed
//! elements; scored members carry an 8-byte big-endian IEEE-754 score.

use std::io::{Read, Write};

use bytes::Bytes;

use crate::error::{ReshardError, Result};

use super::{Value, ValueKind};

/// Header size: 1 byte op/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (64 MB; whole values travel in one message)
pub const MAX_PAYLOAD_SIZE: u32 = 64 * 1024 * 1024;

/// Request operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    Ping = 0x01,
    Select = 0x02,
    Keys = 0x03,
    DbSize = 0x04,
    Kind = 0x05,
    Read = 0x06,
    Write = 0x07,
    Delete = 0x08,
    Ttl = 0x09,
    Expire = 0x0A,
    FlushDb = 0x0B,
}

/// A request to the backend
#[derive(Debug, Clone)]
pub enum Request {
    Ping,
    Select { db: u32 },
    Keys,
    DbSize,
    Kind { key: Bytes },
    Read { key: Bytes },
    Write { key: Bytes, value: Value },
    Delete { key: Bytes },
    Ttl { key: Bytes },
    Expire { key: Bytes, seconds: u64 },
    FlushDb,
}

impl Request {
    fn op(&self) -> Op {
        match self {
            Request::Ping => Op::Ping,
            Request::Select { .. } => Op::Select,
            Request::Keys => Op::Keys,
            Request::DbSize => Op::DbSize,
            Request::Kind { .. } => Op::Kind,
            Request::Read { .. } => Op::Read,
            Request::Write { .. } => Op::Write,
            Request::Delete { .. } => Op::Delete,
            Request::Ttl { .. } => Op::Ttl,
            Request::Expire { .. } => Op::Expire,
            Request::FlushDb => Op::FlushDb,
        }
    }
}

/// Response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    Error = 0x02,
}

/// A decoded response frame
#[derive(Debug, Clone)]
pub struct ResponseFrame {
    pub status: Status,
    pub payload: Vec<u8>,
}

// =============================================================================
// Request Encoding
// =============================================================================

/// Encode a request to bytes
///
/// Format: op (1) + payload_len (4) + payload
pub fn encode_request(request: &Request) -> Vec<u8> {
    let payload = match request {
        Request::Ping | Request::Keys | Request::DbSize | Request::FlushDb => Vec::new(),
        Request::Select { db } => db.to_be_bytes().to_vec(),
        Request::Kind { key }
        | Request::Read { key }
        | Request::Delete { key }
        | Request::Ttl { key } => encode_key(key),
        Request::Write { key, value } => {
            let mut payload = encode_key(key);
            encode_value_into(value, &mut payload);
            payload
        }
        Request::Expire { key, seconds } => {
            let mut payload = encode_key(key);
            payload.extend_from_slice(&seconds.to_be_bytes());
            payload
        }
    };

    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    message.push(request.op() as u8);
    message.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    message.extend_from_slice(&payload);

    message
}

fn encode_key(key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + key.len());
    out.extend_from_slice(&(key.len() as u32).to_be_bytes());
    out.extend_from_slice(key);
    out
}

fn encode_bytes_into(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

/// Encode a value: kind tag (1) + kind-specific body
pub fn encode_value_into(value: &Value, out: &mut Vec<u8>) {
    out.push(kind_tag(value.kind()));
    match value {
        Value::Scalar(v) => encode_bytes_into(v, out),
        Value::FieldMap(fields) => {
            out.extend_from_slice(&(fields.len() as u32).to_be_bytes());
            for (field, v) in fields {
                encode_bytes_into(field, out);
                encode_bytes_into(v, out);
            }
        }
        Value::Sequence(items) => encode_bytes_list_into(items, out),
        Value::Set(members) => encode_bytes_list_into(members, out),
        Value::ScoredSet(members) => {
            out.extend_from_slice(&(members.len() as u32).to_be_bytes());
            for (member, score) in members {
                encode_bytes_into(member, out);
                out.extend_from_slice(&score.to_be_bytes());
            }
        }
    }
}

fn encode_bytes_list_into(items: &[Bytes], out: &mut Vec<u8>) {
    out.extend_from_slice(&(items.len() as u32).to_be_bytes());
    for item in items {
        encode_bytes_into(item, out);
    }
}

fn kind_tag(kind: ValueKind) -> u8 {
    match kind {
        ValueKind::Absent => 0x00,
        ValueKind::Scalar => 0x01,
        ValueKind::FieldMap => 0x02,
        ValueKind::Sequence => 0x03,
        ValueKind::Set => 0x04,
        ValueKind::ScoredSet => 0x05,
    }
}

// =============================================================================
// Response Payload Decoding
// =============================================================================

/// A cursor over a response payload
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.bytes.len() - self.pos < n {
            return Err(ReshardError::Protocol(format!(
                "truncated payload: wanted {} bytes, {} left",
                n,
                self.bytes.len() - self.pos
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_be_bytes(buf))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(self.u64()? as i64)
    }

    fn f64(&mut self) -> Result<f64> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(f64::from_be_bytes(buf))
    }

    fn bytes(&mut self) -> Result<Bytes> {
        let len = self.u32()? as usize;
        Ok(Bytes::copy_from_slice(self.take(len)?))
    }

    fn finish(&self) -> Result<()> {
        if self.pos != self.bytes.len() {
            return Err(ReshardError::Protocol(format!(
                "{} trailing bytes in payload",
                self.bytes.len() - self.pos
            )));
        }
        Ok(())
    }
}

/// Decode a KEYS payload: count (4) + count × (len (4) + key)
pub fn decode_keys(payload: &[u8]) -> Result<Vec<Bytes>> {
    let mut cursor = Cursor::new(payload);
    let count = cursor.u32()? as usize;
    let mut keys = Vec::with_capacity(count);
    for _ in 0..count {
        keys.push(cursor.bytes()?);
    }
    cursor.finish()?;
    Ok(keys)
}

/// Decode a DBSIZE payload: count (8)
pub fn decode_db_size(payload: &[u8]) -> Result<u64> {
    let mut cursor = Cursor::new(payload);
    let size = cursor.u64()?;
    cursor.finish()?;
    Ok(size)
}

/// Decode a KIND payload: kind tag (1)
pub fn decode_kind(payload: &[u8]) -> Result<ValueKind> {
    let mut cursor = Cursor::new(payload);
    let tag = cursor.take(1)?[0];
    cursor.finish()?;
    match tag {
        0x00 => Ok(ValueKind::Absent),
        0x01 => Ok(ValueKind::Scalar),
        0x02 => Ok(ValueKind::FieldMap),
        0x03 => Ok(ValueKind::Sequence),
        0x04 => Ok(ValueKind::Set),
        0x05 => Ok(ValueKind::ScoredSet),
        _ => Err(ReshardError::Protocol(format!(
            "unknown value kind tag: 0x{:02x}",
            tag
        ))),
    }
}

/// Decode a READ payload: kind tag (1) + kind-specific body
pub fn decode_value(payload: &[u8]) -> Result<Value> {
    let mut cursor = Cursor::new(payload);
    let tag = cursor.take(1)?[0];

    let value = match tag {
        0x01 => Value::Scalar(cursor.bytes()?),
        0x02 => {
            let count = cursor.u32()? as usize;
            let mut fields = Vec::with_capacity(count);
            for _ in 0..count {
                let field = cursor.bytes()?;
                let v = cursor.bytes()?;
                fields.push((field, v));
            }
            Value::FieldMap(fields)
        }
        0x03 | 0x04 => {
            let count = cursor.u32()? as usize;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(cursor.bytes()?);
            }
            if tag == 0x03 {
                Value::Sequence(items)
            } else {
                Value::Set(items)
            }
        }
        0x05 => {
            let count = cursor.u32()? as usize;
            let mut members = Vec::with_capacity(count);
            for _ in 0..count {
                let member = cursor.bytes()?;
                let score = cursor.f64()?;
                members.push((member, score));
            }
            Value::ScoredSet(members)
        }
        _ => {
            return Err(ReshardError::Protocol(format!(
                "unknown value kind tag: 0x{:02x}",
                tag
            )))
        }
    };

    cursor.finish()?;
    Ok(value)
}

/// Decode a TTL payload: signed seconds (8); -2 = missing, -1 = persistent
pub fn decode_ttl_secs(payload: &[u8]) -> Result<i64> {
    let mut cursor = Cursor::new(payload);
    let secs = cursor.i64()?;
    cursor.finish()?;
    Ok(secs)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Write a request to a stream
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    let bytes = encode_request(request);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response frame from a stream
///
/// Blocks until a complete frame is received or an error occurs
pub fn read_response<R: Read>(reader: &mut R) -> Result<ResponseFrame> {
    // Read header first
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let status = match header[0] {
        0x00 => Status::Ok,
        0x01 => Status::NotFound,
        0x02 => Status::Error,
        other => {
            return Err(ReshardError::Protocol(format!(
                "unknown response status: 0x{:02x}",
                other
            )))
        }
    };

    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(ReshardError::Protocol(format!(
            "response payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let mut payload = vec![0u8; payload_len as usize];
    if payload_len > 0 {
        reader.read_exact(&mut payload)?;
    }

    Ok(ResponseFrame { status, payload })
}
