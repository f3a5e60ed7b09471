//! TCP backend client
//!
//! Implements [`KvClient`] over the binary protocol in [`super::wire`].
//! One connection serves one (server, database) pair: the connector opens
//! the socket, pings it, and issues a SELECT before handing it out.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::time::Duration;

use bytes::Bytes;

use crate::error::{ReshardError, Result};

use super::wire::{self, Request, ResponseFrame, Status};
use super::{Connector, KvClient, Ttl, Value, ValueKind};

/// Default socket timeout; a hung server should fail the run, not wedge it
const IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Connector that opens [`TcpClient`] connections
#[derive(Debug, Clone, Default)]
pub struct TcpConnector;

impl TcpConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for TcpConnector {
    type Conn = TcpClient;

    fn connect(&self, host: &str, port: u16, db: u32) -> Result<TcpClient> {
        let mut client = TcpClient::connect(host, port)?;
        client.select(db)?;
        Ok(client)
    }
}

/// A connection to one database of one server
pub struct TcpClient {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    peer_addr: String,
}

impl TcpClient {
    /// Open a connection and verify the server answers
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let peer_addr = format!("{}:{}", host, port);
        let stream = TcpStream::connect(&peer_addr)
            .map_err(|e| ReshardError::Client(format!("connect {}: {}", peer_addr, e)))?;

        // Low latency matters more than throughput for single-key traffic
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;

        let read_stream = stream.try_clone()?;
        let mut client = Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            peer_addr,
        };

        client.ping()?;
        Ok(client)
    }

    /// Bind this connection to a database index
    fn select(&mut self, db: u32) -> Result<()> {
        self.ok_response(&Request::Select { db })?;
        Ok(())
    }

    /// Send a request and read the raw response frame
    fn round_trip(&mut self, request: &Request) -> Result<ResponseFrame> {
        wire::write_request(&mut self.writer, request)?;
        let frame = wire::read_response(&mut self.reader)?;

        if frame.status == Status::Error {
            let message = String::from_utf8_lossy(&frame.payload).into_owned();
            return Err(ReshardError::Client(format!(
                "{}: {}",
                self.peer_addr, message
            )));
        }

        Ok(frame)
    }

    /// Send a request that must succeed with an OK status
    fn ok_response(&mut self, request: &Request) -> Result<ResponseFrame> {
        let frame = self.round_trip(request)?;
        match frame.status {
            Status::Ok => Ok(frame),
            Status::NotFound => Err(ReshardError::KeyNotFound),
            Status::Error => unreachable!("round_trip maps Error to Err"),
        }
    }

    fn read_value_of(&mut self, key: &[u8], expected: ValueKind) -> Result<Value> {
        let frame = self.ok_response(&Request::Read {
            key: Bytes::copy_from_slice(key),
        })?;
        let value = wire::decode_value(&frame.payload)?;
        if value.kind() != expected {
            return Err(ReshardError::Client(format!(
                "{}: value is a {}, expected a {}",
                self.peer_addr,
                value.kind(),
                expected
            )));
        }
        Ok(value)
    }
}

impl KvClient for TcpClient {
    fn ping(&mut self) -> Result<()> {
        self.ok_response(&Request::Ping)?;
        Ok(())
    }

    fn db_size(&mut self) -> Result<u64> {
        let frame = self.ok_response(&Request::DbSize)?;
        wire::decode_db_size(&frame.payload)
    }

    fn keys(&mut self) -> Result<Vec<Bytes>> {
        let frame = self.ok_response(&Request::Keys)?;
        wire::decode_keys(&frame.payload)
    }

    fn kind_of(&mut self, key: &[u8]) -> Result<ValueKind> {
        let frame = self.round_trip(&Request::Kind {
            key: Bytes::copy_from_slice(key),
        })?;
        match frame.status {
            Status::NotFound => Ok(ValueKind::Absent),
            _ => wire::decode_kind(&frame.payload),
        }
    }

    fn read_scalar(&mut self, key: &[u8]) -> Result<Bytes> {
        match self.read_value_of(key, ValueKind::Scalar)? {
            Value::Scalar(v) => Ok(v),
            _ => unreachable!("read_value_of checked the kind"),
        }
    }

    fn read_field_map(&mut self, key: &[u8]) -> Result<Vec<(Bytes, Bytes)>> {
        match self.read_value_of(key, ValueKind::FieldMap)? {
            Value::FieldMap(fields) => Ok(fields),
            _ => unreachable!("read_value_of checked the kind"),
        }
    }

    fn read_sequence(&mut self, key: &[u8]) -> Result<Vec<Bytes>> {
        match self.read_value_of(key, ValueKind::Sequence)? {
            Value::Sequence(items) => Ok(items),
            _ => unreachable!("read_value_of checked the kind"),
        }
    }

    fn read_set(&mut self, key: &[u8]) -> Result<Vec<Bytes>> {
        match self.read_value_of(key, ValueKind::Set)? {
            Value::Set(members) => Ok(members),
            _ => unreachable!("read_value_of checked the kind"),
        }
    }

    fn read_scored_set(&mut self, key: &[u8]) -> Result<Vec<(Bytes, f64)>> {
        match self.read_value_of(key, ValueKind::ScoredSet)? {
            Value::ScoredSet(members) => Ok(members),
            _ => unreachable!("read_value_of checked the kind"),
        }
    }

    fn write_scalar(&mut self, key: &[u8], value: Bytes) -> Result<()> {
        self.write_value(key, Value::Scalar(value))
    }

    fn write_field_map(&mut self, key: &[u8], fields: Vec<(Bytes, Bytes)>) -> Result<()> {
        self.write_value(key, Value::FieldMap(fields))
    }

    fn write_sequence(&mut self, key: &[u8], items: Vec<Bytes>) -> Result<()> {
        self.write_value(key, Value::Sequence(items))
    }

    fn write_set(&mut self, key: &[u8], members: Vec<Bytes>) -> Result<()> {
        self.write_value(key, Value::Set(members))
    }

    fn write_scored_set(&mut self, key: &[u8], members: Vec<(Bytes, f64)>) -> Result<()> {
        self.write_value(key, Value::ScoredSet(members))
    }

    fn ttl(&mut self, key: &[u8]) -> Result<Ttl> {
        let frame = self.ok_response(&Request::Ttl {
            key: Bytes::copy_from_slice(key),
        })?;
        match wire::decode_ttl_secs(&frame.payload)? {
            -2 => Ok(Ttl::Missing),
            -1 => Ok(Ttl::Persistent),
            secs if secs >= 0 => Ok(Ttl::Expires(secs as u64)),
            secs => Err(ReshardError::Protocol(format!(
                "invalid TTL from {}: {}",
                self.peer_addr, secs
            ))),
        }
    }

    fn expire(&mut self, key: &[u8], seconds: u64) -> Result<()> {
        self.ok_response(&Request::Expire {
            key: Bytes::copy_from_slice(key),
            seconds,
        })?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        // NotFound is fine here: deleting an absent key is a no-op
        self.round_trip(&Request::Delete {
            key: Bytes::copy_from_slice(key),
        })?;
        Ok(())
    }

    fn flush_db(&mut self) -> Result<()> {
        self.ok_response(&Request::FlushDb)?;
        Ok(())
    }
}

impl TcpClient {
    fn write_value(&mut self, key: &[u8], value: Value) -> Result<()> {
        self.ok_response(&Request::Write {
            key: Bytes::copy_from_slice(key),
            value,
        })?;
        Ok(())
    }
}
