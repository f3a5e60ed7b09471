//! In-memory backend
//!
//! A process-local cluster of named servers, each holding numbered
//! databases. This is the reference implementation of [`KvClient`]: the
//! integration suite runs entire migrations against it, and its lazy-expiry
//! behavior defines what the engine expects from a real backend.
//!
//! Keys live in a `BTreeMap`, so `keys()` enumerates in a stable order:
//! convenient for tests, and no stronger than what a real scan provides
//! (the snapshot freezes whatever order the scan returned).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{ReshardError, Result};

use super::{Connector, KvClient, Ttl, Value, ValueKind};

/// One stored key: its value and an optional expiry deadline
#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

type Db = BTreeMap<Bytes, Entry>;

#[derive(Debug, Default)]
struct ClusterInner {
    /// `host:port` → database index → keyspace
    servers: HashMap<String, HashMap<u32, Db>>,
}

/// A shared in-memory cluster of key-value servers
///
/// Cheaply cloneable; all clones observe the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryCluster {
    inner: Arc<RwLock<ClusterInner>>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a server; connections to unregistered addresses fail
    pub fn add_server(&self, host: &str, port: u16) {
        self.inner
            .write()
            .servers
            .entry(format!("{}:{}", host, port))
            .or_default();
    }

    /// A connector handle for this cluster
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            cluster: self.clone(),
        }
    }

    // =========================================================================
    // Seeding / Inspection Helpers
    // =========================================================================

    /// Store a value directly (for seeding test fixtures)
    pub fn put(&self, host: &str, port: u16, db: u32, key: &[u8], value: Value) {
        self.put_entry(host, port, db, key, value, None);
    }

    /// Store a value that expires after `ttl_secs` seconds
    pub fn put_with_ttl(&self, host: &str, port: u16, db: u32, key: &[u8], value: Value, ttl_secs: u64) {
        let deadline = Instant::now() + Duration::from_secs(ttl_secs);
        self.put_entry(host, port, db, key, value, Some(deadline));
    }

    fn put_entry(
        &self,
        host: &str,
        port: u16,
        db: u32,
        key: &[u8],
        value: Value,
        expires_at: Option<Instant>,
    ) {
        let mut inner = self.inner.write();
        let server = inner
            .servers
            .entry(format!("{}:{}", host, port))
            .or_default();
        server
            .entry(db)
            .or_default()
            .insert(Bytes::copy_from_slice(key), Entry { value, expires_at });
    }

    /// Read a value directly, honoring expiry (for assertions)
    pub fn value_of(&self, host: &str, port: u16, db: u32, key: &[u8]) -> Option<Value> {
        let inner = self.inner.read();
        let entry = inner
            .servers
            .get(&format!("{}:{}", host, port))?
            .get(&db)?
            .get(key)?;
        if entry.is_expired(Instant::now()) {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Number of live keys in a database (for assertions)
    pub fn key_count(&self, host: &str, port: u16, db: u32) -> usize {
        let inner = self.inner.read();
        let now = Instant::now();
        inner
            .servers
            .get(&format!("{}:{}", host, port))
            .and_then(|server| server.get(&db))
            .map(|keys| keys.values().filter(|e| !e.is_expired(now)).count())
            .unwrap_or(0)
    }
}

/// Connector for [`MemoryCluster`]
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    cluster: MemoryCluster,
}

impl Connector for MemoryConnector {
    type Conn = MemoryConnection;

    fn connect(&self, host: &str, port: u16, db: u32) -> Result<MemoryConnection> {
        let addr = format!("{}:{}", host, port);
        if !self.cluster.inner.read().servers.contains_key(&addr) {
            return Err(ReshardError::Client(format!("no such server: {}", addr)));
        }
        Ok(MemoryConnection {
            cluster: self.cluster.clone(),
            addr,
            db,
        })
    }
}

/// A connection bound to one database of one in-memory server
#[derive(Debug)]
pub struct MemoryConnection {
    cluster: MemoryCluster,
    addr: String,
    db: u32,
}

impl MemoryConnection {
    /// Run `f` against this connection's keyspace with expired keys purged
    /// lazily: any entry past its deadline is removed before `f` runs.
    fn with_db<T>(&mut self, f: impl FnOnce(&mut Db) -> Result<T>) -> Result<T> {
        let mut inner = self.cluster.inner.write();
        let server = inner
            .servers
            .get_mut(&self.addr)
            .ok_or_else(|| ReshardError::Client(format!("no such server: {}", self.addr)))?;
        let db = server.entry(self.db).or_default();

        let now = Instant::now();
        db.retain(|_, entry| !entry.is_expired(now));

        f(db)
    }

    fn read_value(&mut self, key: &[u8]) -> Result<Value> {
        self.with_db(|db| {
            db.get(key)
                .map(|entry| entry.value.clone())
                .ok_or(ReshardError::KeyNotFound)
        })
    }
}

/// Reads of a key holding a different structure fail the way a real backend
/// rejects a wrong-type operation.
fn wrong_kind(expected: ValueKind, actual: ValueKind) -> ReshardError {
    ReshardError::Client(format!(
        "value is a {}, expected a {}",
        actual, expected
    ))
}

impl KvClient for MemoryConnection {
    fn ping(&mut self) -> Result<()> {
        self.with_db(|_| Ok(()))
    }

    fn db_size(&mut self) -> Result<u64> {
        self.with_db(|db| Ok(db.len() as u64))
    }

    fn keys(&mut self) -> Result<Vec<Bytes>> {
        self.with_db(|db| Ok(db.keys().cloned().collect()))
    }

    fn kind_of(&mut self, key: &[u8]) -> Result<ValueKind> {
        self.with_db(|db| {
            Ok(db
                .get(key)
                .map(|entry| entry.value.kind())
                .unwrap_or(ValueKind::Absent))
        })
    }

    fn read_scalar(&mut self, key: &[u8]) -> Result<Bytes> {
        match self.read_value(key)? {
            Value::Scalar(v) => Ok(v),
            other => Err(wrong_kind(ValueKind::Scalar, other.kind())),
        }
    }

    fn read_field_map(&mut self, key: &[u8]) -> Result<Vec<(Bytes, Bytes)>> {
        match self.read_value(key)? {
            Value::FieldMap(fields) => Ok(fields),
            other => Err(wrong_kind(ValueKind::FieldMap, other.kind())),
        }
    }

    fn read_sequence(&mut self, key: &[u8]) -> Result<Vec<Bytes>> {
        match self.read_value(key)? {
            Value::Sequence(items) => Ok(items),
            other => Err(wrong_kind(ValueKind::Sequence, other.kind())),
        }
    }

    fn read_set(&mut self, key: &[u8]) -> Result<Vec<Bytes>> {
        match self.read_value(key)? {
            Value::Set(members) => Ok(members),
            other => Err(wrong_kind(ValueKind::Set, other.kind())),
        }
    }

    fn read_scored_set(&mut self, key: &[u8]) -> Result<Vec<(Bytes, f64)>> {
        match self.read_value(key)? {
            Value::ScoredSet(members) => Ok(members),
            other => Err(wrong_kind(ValueKind::ScoredSet, other.kind())),
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
        self.with_db(|db| {
            let Some(entry) = db.get(key) else {
                return Ok(Ttl::Missing);
            };
            match entry.expires_at {
                None => Ok(Ttl::Persistent),
                Some(deadline) => {
                    // Round up so a freshly set TTL reads back whole
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    let mut secs = remaining.as_secs();
                    if remaining.subsec_nanos() > 0 {
                        secs += 1;
                    }
                    Ok(Ttl::Expires(secs))
                }
            }
        })
    }

    fn expire(&mut self, key: &[u8], seconds: u64) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(seconds);
        self.with_db(|db| {
            if let Some(entry) = db.get_mut(key) {
                entry.expires_at = Some(deadline);
            }
            Ok(())
        })
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.with_db(|db| {
            db.remove(key);
            Ok(())
        })
    }

    fn flush_db(&mut self) -> Result<()> {
        self.with_db(|db| {
            db.clear();
            Ok(())
        })
    }
}

impl MemoryConnection {
    fn write_value(&mut self, key: &[u8], value: Value) -> Result<()> {
        let key = Bytes::copy_from_slice(key);
        self.with_db(|db| {
            // Plain overwrite; any previous expiry is discarded with the old value
            db.insert(
                key,
                Entry {
                    value,
                    expires_at: None,
                },
            );
            Ok(())
        })
    }
}
