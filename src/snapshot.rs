//! Keyspace snapshotting
//!
//! A migration iterates a *frozen* key list, not the live keyspace. Scanning
//! again mid-migration could move a key to a different offset or miss it
//! entirely under concurrent writes, which would break the monotonic
//! checkpoint. So each (source, db) pair is scanned exactly once, and the
//! result is persisted before any key is copied.

use tracing::info;

use crate::client::KvClient;
use crate::config::PairId;
use crate::error::Result;
use crate::state::CheckpointStore;

/// Ensure a frozen key snapshot exists for this pair
///
/// If the pair already has a snapshot, this is a no-op: no re-scan, no
/// duplicate entries. Otherwise the full keyspace is enumerated and the
/// list is installed together with the have-snapshot flag in a single
/// persisted write, so an interrupted scan leaves nothing behind and is
/// simply retried from scratch on the next run.
///
/// Returns the snapshot length.
pub fn ensure_snapshot<K: KvClient>(
    store: &mut CheckpointStore,
    pair: &PairId,
    conn: &mut K,
) -> Result<usize> {
    if store.have_snapshot(pair) {
        return Ok(store.snapshot_len(pair) as usize);
    }

    let reported = conn.db_size()?;
    let keys = conn.keys()?;

    // The scan and the size report race against live writes; the scan wins.
    info!(
        pair = %pair,
        scanned = keys.len(),
        reported,
        "snapshot captured"
    );

    let len = keys.len();
    store.install_snapshot(pair, keys)?;
    Ok(len)
}
