//! Tests for the type-aware copier
//!
//! These tests verify:
//! - Faithful reproduction of every value structure
//! - Idempotence: copying twice leaves the same end state as copying once
//! - Expired keys skipped silently with zero effect on the target
//! - TTL carried over, bounded by the source's remaining TTL

use bytes::Bytes;
use reshardkv::client::memory::{MemoryCluster, MemoryConnection};
use reshardkv::client::{Connector, KvClient, Ttl, Value};
use reshardkv::copier::{copy_key, CopyOutcome};

// =============================================================================
// Helper Functions
// =============================================================================

const SRC: (&str, u16) = ("src-a", 7000);
const TGT: (&str, u16) = ("tgt-a", 7100);

fn setup() -> (MemoryCluster, MemoryConnection, MemoryConnection) {
    let cluster = MemoryCluster::new();
    cluster.add_server(SRC.0, SRC.1);
    cluster.add_server(TGT.0, TGT.1);

    let connector = cluster.connector();
    let source = connector.connect(SRC.0, SRC.1, 0).unwrap();
    let target = connector.connect(TGT.0, TGT.1, 0).unwrap();
    (cluster, source, target)
}

fn b(s: &str) -> Bytes {
    Bytes::copy_from_slice(s.as_bytes())
}

// =============================================================================
// Per-Structure Copy Tests
// =============================================================================

#[test]
fn test_copy_scalar() {
    let (cluster, mut source, mut target) = setup();
    cluster.put(SRC.0, SRC.1, 0, b"greeting", Value::Scalar(b("hello")));

    let outcome = copy_key(&b("greeting"), &mut source, &mut target).unwrap();

    assert!(matches!(outcome, CopyOutcome::Copied(_)));
    assert_eq!(
        cluster.value_of(TGT.0, TGT.1, 0, b"greeting"),
        Some(Value::Scalar(b("hello")))
    );
}

#[test]
fn test_copy_field_map() {
    let (cluster, mut source, mut target) = setup();
    let fields = vec![(b("name"), b("alice")), (b("role"), b("admin"))];
    cluster.put(SRC.0, SRC.1, 0, b"user:1", Value::FieldMap(fields.clone()));

    copy_key(&b("user:1"), &mut source, &mut target).unwrap();

    assert_eq!(
        cluster.value_of(TGT.0, TGT.1, 0, b"user:1"),
        Some(Value::FieldMap(fields))
    );
}

#[test]
fn test_copy_sequence_preserves_order() {
    let (cluster, mut source, mut target) = setup();
    let items = vec![b("first"), b("second"), b("third")];
    cluster.put(SRC.0, SRC.1, 0, b"queue", Value::Sequence(items.clone()));

    copy_key(&b("queue"), &mut source, &mut target).unwrap();

    assert_eq!(
        cluster.value_of(TGT.0, TGT.1, 0, b"queue"),
        Some(Value::Sequence(items))
    );
}

#[test]
fn test_copy_set() {
    let (cluster, mut source, mut target) = setup();
    let members = vec![b("red"), b("green"), b("blue")];
    cluster.put(SRC.0, SRC.1, 0, b"colors", Value::Set(members.clone()));

    copy_key(&b("colors"), &mut source, &mut target).unwrap();

    assert_eq!(
        cluster.value_of(TGT.0, TGT.1, 0, b"colors"),
        Some(Value::Set(members))
    );
}

#[test]
fn test_copy_scored_set() {
    let (cluster, mut source, mut target) = setup();
    let members = vec![(b("bronze"), 3.0), (b("silver"), 2.0), (b("gold"), 1.0)];
    cluster.put(SRC.0, SRC.1, 0, b"ranks", Value::ScoredSet(members.clone()));

    copy_key(&b("ranks"), &mut source, &mut target).unwrap();

    assert_eq!(
        cluster.value_of(TGT.0, TGT.1, 0, b"ranks"),
        Some(Value::ScoredSet(members))
    );
}

// =============================================================================
// Idempotence Tests
// =============================================================================

#[test]
fn test_copy_twice_is_idempotent_for_scalar() {
    let (cluster, mut source, mut target) = setup();
    cluster.put(SRC.0, SRC.1, 0, b"k", Value::Scalar(b("v")));

    copy_key(&b("k"), &mut source, &mut target).unwrap();
    copy_key(&b("k"), &mut source, &mut target).unwrap();

    assert_eq!(
        cluster.value_of(TGT.0, TGT.1, 0, b"k"),
        Some(Value::Scalar(b("v")))
    );
}

#[test]
fn test_copy_twice_does_not_duplicate_sequence() {
    let (cluster, mut source, mut target) = setup();
    let items = vec![b("a"), b("b")];
    cluster.put(SRC.0, SRC.1, 0, b"seq", Value::Sequence(items.clone()));

    copy_key(&b("seq"), &mut source, &mut target).unwrap();
    copy_key(&b("seq"), &mut source, &mut target).unwrap();

    // Two elements, not four
    assert_eq!(
        cluster.value_of(TGT.0, TGT.1, 0, b"seq"),
        Some(Value::Sequence(items))
    );
}

#[test]
fn test_copy_overwrites_stale_target_value() {
    let (cluster, mut source, mut target) = setup();
    cluster.put(SRC.0, SRC.1, 0, b"k", Value::Scalar(b("fresh")));
    // Target holds something different, even structurally different
    cluster.put(TGT.0, TGT.1, 0, b"k", Value::Set(vec![b("stale")]));

    copy_key(&b("k"), &mut source, &mut target).unwrap();

    assert_eq!(
        cluster.value_of(TGT.0, TGT.1, 0, b"k"),
        Some(Value::Scalar(b("fresh")))
    );
}

// =============================================================================
// Absent-Key Tests
// =============================================================================

#[test]
fn test_missing_key_is_skipped() {
    let (cluster, mut source, mut target) = setup();

    let outcome = copy_key(&b("ghost"), &mut source, &mut target).unwrap();

    assert_eq!(outcome, CopyOutcome::Skipped);
    assert_eq!(cluster.value_of(TGT.0, TGT.1, 0, b"ghost"), None);
}

#[test]
fn test_expired_key_is_skipped_without_touching_target() {
    let (cluster, mut source, mut target) = setup();
    // Already past its deadline by the time the copier looks at it
    cluster.put_with_ttl(SRC.0, SRC.1, 0, b"gone", Value::Scalar(b("x")), 0);

    // Whatever the target held for that key stays as it is
    cluster.put(TGT.0, TGT.1, 0, b"gone", Value::Scalar(b("keep-me")));

    let outcome = copy_key(&b("gone"), &mut source, &mut target).unwrap();

    assert_eq!(outcome, CopyOutcome::Skipped);
    assert_eq!(
        cluster.value_of(TGT.0, TGT.1, 0, b"gone"),
        Some(Value::Scalar(b("keep-me")))
    );
}

// =============================================================================
// TTL Tests
// =============================================================================

#[test]
fn test_ttl_carried_to_target() {
    let (cluster, mut source, mut target) = setup();
    cluster.put_with_ttl(SRC.0, SRC.1, 0, b"session", Value::Scalar(b("tok")), 120);

    copy_key(&b("session"), &mut source, &mut target).unwrap();

    match target.ttl(b"session").unwrap() {
        Ttl::Expires(secs) => {
            assert!(secs > 0, "target TTL must be positive right after copy");
            assert!(secs <= 120, "target TTL may not exceed the source's");
        }
        other => panic!("expected a finite TTL on the target, got {:?}", other),
    }
}

#[test]
fn test_persistent_key_stays_persistent() {
    let (cluster, mut source, mut target) = setup();
    cluster.put(SRC.0, SRC.1, 0, b"config", Value::Scalar(b("v")));

    copy_key(&b("config"), &mut source, &mut target).unwrap();

    assert_eq!(target.ttl(b"config").unwrap(), Ttl::Persistent);
}
