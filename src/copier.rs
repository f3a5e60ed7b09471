//! Type-aware key copy
//!
//! Reproduces one key on a target connection: read the value in whatever
//! structure it has, overwrite the target, carry the remaining TTL across.
//!
//! Copies are idempotent overwrites. For container structures that means
//! deleting the target key before rewriting it: appending a sequence onto
//! a previous copy of itself would duplicate every element, and the whole
//! resume model depends on re-copying a batch being harmless.

use bytes::Bytes;
use tracing::trace;

use crate::client::{KvClient, Ttl, Value, ValueKind};
use crate::error::{ReshardError, Result};

/// What happened to one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The value was reproduced on the target
    Copied(ValueKind),

    /// The key no longer exists on the source (expired since the snapshot);
    /// nothing was written
    Skipped,
}

/// Copy one key from `source` to `target`
///
/// A key whose kind resolves to `Absent`, or that vanishes between the
/// kind check and the read, is treated as already gone and skipped with
/// zero effect. The TTL transfer is best-effort: the seconds remaining at
/// read time are applied verbatim, so the target expires at approximately
/// the same wall-clock time, minus in-flight latency.
pub fn copy_key<K: KvClient>(key: &Bytes, source: &mut K, target: &mut K) -> Result<CopyOutcome> {
    let kind = source.kind_of(key)?;

    let read = match kind {
        ValueKind::Absent => return Ok(CopyOutcome::Skipped),
        ValueKind::Scalar => source.read_scalar(key).map(Value::Scalar),
        ValueKind::FieldMap => source.read_field_map(key).map(Value::FieldMap),
        ValueKind::Sequence => source.read_sequence(key).map(Value::Sequence),
        ValueKind::Set => source.read_set(key).map(Value::Set),
        ValueKind::ScoredSet => source.read_scored_set(key).map(Value::ScoredSet),
    };

    let value = match read {
        Ok(value) => value,
        // Expired between the kind check and the read
        Err(ReshardError::KeyNotFound) => return Ok(CopyOutcome::Skipped),
        Err(e) => return Err(e),
    };

    // Scalar writes overwrite on their own; containers need the old key gone
    if !matches!(value, Value::Scalar(_)) {
        target.delete(key)?;
    }

    write_value(target, key, value)?;

    match source.ttl(key)? {
        Ttl::Expires(secs) if secs > 0 => target.expire(key, secs)?,
        _ => {}
    }

    trace!(key = ?key, kind = %kind, "key copied");
    Ok(CopyOutcome::Copied(kind))
}

fn write_value<K: KvClient>(conn: &mut K, key: &[u8], value: Value) -> Result<()> {
    match value {
        Value::Scalar(v) => conn.write_scalar(key, v),
        Value::FieldMap(fields) => conn.write_field_map(key, fields),
        Value::Sequence(items) => conn.write_sequence(key, items),
        Value::Set(members) => conn.write_set(key, members),
        Value::ScoredSet(members) => conn.write_scored_set(key, members),
    }
}
