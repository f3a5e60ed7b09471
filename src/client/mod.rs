//! Key-value backend client abstraction
//!
//! The migration engine never speaks a wire protocol itself; it consumes a
//! backend through the [`KvClient`] trait. A connection is bound to one
//! (server, database) pair at connect time, the way key-value clients select
//! a database per connection.
//!
//! ## Required capabilities
//! - enumerate every key in the database (snapshot scan)
//! - report the database size
//! - check a key's structural kind
//! - read/write each of the five value structures
//! - read and set per-key expiration
//! - delete a key, flush the whole database
//!
//! Two implementations ship with the crate: [`memory`] (the in-process
//! reference backend, used throughout the test suite) and [`tcp`] (the
//! binary wire client used by the command-line tools).

mod value;

pub mod memory;
pub mod tcp;
pub mod wire;

pub use value::{Ttl, Value, ValueKind};

use bytes::Bytes;

use crate::error::Result;

/// Client connection to one database of one server
///
/// Read methods return [`crate::ReshardError::KeyNotFound`] when the key has
/// vanished between a kind check and the read; callers treat that as an
/// expired key, not a failure.
pub trait KvClient {
    /// Liveness/compatibility probe; fatal for the run if it fails
    fn ping(&mut self) -> Result<()>;

    /// Number of keys currently in the database
    fn db_size(&mut self) -> Result<u64>;

    /// Enumerate every key currently in the database (full keyspace scan)
    fn keys(&mut self) -> Result<Vec<Bytes>>;

    /// Structural kind of a key's value; `Absent` if the key does not exist
    fn kind_of(&mut self, key: &[u8]) -> Result<ValueKind>;

    // -------------------------------------------------------------------------
    // Reads (one per structure)
    // -------------------------------------------------------------------------
    fn read_scalar(&mut self, key: &[u8]) -> Result<Bytes>;
    fn read_field_map(&mut self, key: &[u8]) -> Result<Vec<(Bytes, Bytes)>>;
    fn read_sequence(&mut self, key: &[u8]) -> Result<Vec<Bytes>>;
    fn read_set(&mut self, key: &[u8]) -> Result<Vec<Bytes>>;
    fn read_scored_set(&mut self, key: &[u8]) -> Result<Vec<(Bytes, f64)>>;

    // -------------------------------------------------------------------------
    // Writes (one per structure)
    // -------------------------------------------------------------------------
    fn write_scalar(&mut self, key: &[u8], value: Bytes) -> Result<()>;
    fn write_field_map(&mut self, key: &[u8], fields: Vec<(Bytes, Bytes)>) -> Result<()>;
    fn write_sequence(&mut self, key: &[u8], items: Vec<Bytes>) -> Result<()>;
    fn write_set(&mut self, key: &[u8], members: Vec<Bytes>) -> Result<()>;
    fn write_scored_set(&mut self, key: &[u8], members: Vec<(Bytes, f64)>) -> Result<()>;

    // -------------------------------------------------------------------------
    // Expiration and lifecycle
    // -------------------------------------------------------------------------
    /// Remaining time-to-live of a key
    fn ttl(&mut self, key: &[u8]) -> Result<Ttl>;

    /// Set a key's expiration, in whole seconds from now; no-op if absent
    fn expire(&mut self, key: &[u8], seconds: u64) -> Result<()>;

    /// Delete a key; no-op if absent
    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// Remove every key in the database
    fn flush_db(&mut self) -> Result<()>;
}

/// Opens connections to (server, database) pairs
pub trait Connector {
    type Conn: KvClient;

    /// Open a connection bound to one database of one server
    fn connect(&self, host: &str, port: u16, db: u32) -> Result<Self::Conn>;
}
