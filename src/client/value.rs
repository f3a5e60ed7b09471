//! Value model
//!
//! Tagged representations of everything a backend can store. The copier
//! dispatches on these variants rather than on string type tags.

use std::fmt;

use bytes::Bytes;

/// Structural kind of a stored value
///
/// `Absent` is what a key reports after it has expired or been deleted; the
/// migration treats it as "already gone", never as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Scalar,
    FieldMap,
    Sequence,
    Set,
    ScoredSet,
    Absent,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Scalar => write!(f, "scalar"),
            ValueKind::FieldMap => write!(f, "field-map"),
            ValueKind::Sequence => write!(f, "sequence"),
            ValueKind::Set => write!(f, "set"),
            ValueKind::ScoredSet => write!(f, "scored-set"),
            ValueKind::Absent => write!(f, "absent"),
        }
    }
}

/// A fully materialized value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Plain byte string
    Scalar(Bytes),

    /// Unordered field → value mapping
    FieldMap(Vec<(Bytes, Bytes)>),

    /// Ordered sequence of elements
    Sequence(Vec<Bytes>),

    /// Unordered set of unique members
    Set(Vec<Bytes>),

    /// Members ordered by an attached score
    ScoredSet(Vec<(Bytes, f64)>),
}

impl Value {
    /// The structural kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Scalar(_) => ValueKind::Scalar,
            Value::FieldMap(_) => ValueKind::FieldMap,
            Value::Sequence(_) => ValueKind::Sequence,
            Value::Set(_) => ValueKind::Set,
            Value::ScoredSet(_) => ValueKind::ScoredSet,
        }
    }
}

/// Remaining time-to-live of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key does not exist
    Missing,

    /// The key exists and never expires
    Persistent,

    /// The key expires after this many whole seconds
    Expires(u64),
}
