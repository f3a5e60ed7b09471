//! Durable migration metadata
//!
//! Everything the migration must remember between invocations lives here,
//! in its own directory, away from user data:
//!
//! ```text
//! {state_dir}/
//!   ├── migration.state   (bincode: per-pair snapshots, checkpoints, flags)
//!   └── migration.lock    (bincode lease; exists while a run is active)
//! ```
//!
//! ## Responsibilities
//! - Persist the frozen key snapshot and checkpoint offset per (source, db)
//! - Track the one-shot "targets flushed" flag
//! - Provide the cross-process run lock as an atomic check-and-set
//! - Reset everything on an explicit clean
//!
//! Every mutation rewrites the state file via a temp file + atomic rename,
//! so a crash mid-write leaves the previous state intact.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::config::PairId;
use crate::error::{ReshardError, Result};

const STATE_FILENAME: &str = "migration.state";
const STATE_TMP_FILENAME: &str = "migration.state.tmp";
const LOCK_FILENAME: &str = "migration.lock";

/// Migration progress for one (source, db) pair
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PairState {
    /// Frozen, ordered key list; never mutated once `have_snapshot` is set
    pub snapshot: Vec<Bytes>,

    /// How many snapshot keys have been migrated; `0 ..= snapshot.len()`
    pub checkpoint: u64,

    /// Whether the snapshot scan has completed for this pair
    pub have_snapshot: bool,
}

/// On-disk root of the state file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StateFile {
    /// Keyed by `host:port:db`
    pairs: BTreeMap<String, PairState>,

    /// Set after the one-time flush of every target database
    flushed_targets: bool,
}

/// Contents of the lock file
///
/// The lease carries an owner token so a stale lock is at least
/// identifiable. There is deliberately no expiry: only one run may ever be
/// active, and a crashed run's lock is cleared manually or via clean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockLease {
    /// Identifies the process that took the lock
    pub owner: String,

    /// Unix seconds when the lock was taken
    pub acquired_at_epoch_secs: u64,
}

/// Releases the run lock when dropped
///
/// Holding the guard is the only way to be inside a run, so the release in
/// `Drop` makes the lock unconditional even on error paths.
#[derive(Debug)]
pub struct RunLockGuard {
    lock_path: PathBuf,
    released: bool,
}

impl RunLockGuard {
    /// Release explicitly, surfacing any I/O error
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        match fs::remove_file(&self.lock_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = fs::remove_file(&self.lock_path) {
                if e.kind() != ErrorKind::NotFound {
                    tracing::warn!("failed to release run lock {:?}: {}", self.lock_path, e);
                }
            }
        }
    }
}

/// Durable store for snapshots, checkpoints, flags, and the run lock
pub struct CheckpointStore {
    dir: PathBuf,
    state: StateFile,
}

impl CheckpointStore {
    /// Open or create the store in the given directory
    ///
    /// Loads the existing state file if present; a file that fails to
    /// decode is corruption, not an empty state.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let state_path = dir.join(STATE_FILENAME);
        let state = if state_path.exists() {
            let bytes = fs::read(&state_path)?;
            bincode::deserialize(&bytes).map_err(|e| {
                ReshardError::StateCorruption(format!("{}: {}", state_path.display(), e))
            })?
        } else {
            StateFile::default()
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            state,
        })
    }

    // =========================================================================
    // Snapshot
    // =========================================================================

    /// Whether the snapshot scan has completed for this pair
    pub fn have_snapshot(&self, pair: &PairId) -> bool {
        self.pair(pair).map(|p| p.have_snapshot).unwrap_or(false)
    }

    /// The frozen key list for this pair (empty before the snapshot exists)
    pub fn snapshot(&self, pair: &PairId) -> &[Bytes] {
        self.pair(pair).map(|p| p.snapshot.as_slice()).unwrap_or(&[])
    }

    /// Length of the frozen key list
    pub fn snapshot_len(&self, pair: &PairId) -> u64 {
        self.snapshot(pair).len() as u64
    }

    /// Install a completed scan: key list and have-snapshot flag persist in
    /// one write, so a partial scan can never look complete on disk.
    pub fn install_snapshot(&mut self, pair: &PairId, keys: Vec<Bytes>) -> Result<()> {
        let entry = self.state.pairs.entry(pair.to_string()).or_default();
        if entry.have_snapshot {
            return Err(ReshardError::State(format!(
                "snapshot already installed for {}",
                pair
            )));
        }

        entry.snapshot = keys;
        entry.checkpoint = 0;
        entry.have_snapshot = true;
        self.save()
    }

    // =========================================================================
    // Checkpoint
    // =========================================================================

    /// Migrated-key offset for this pair (0 before any batch completes)
    pub fn offset(&self, pair: &PairId) -> u64 {
        self.pair(pair).map(|p| p.checkpoint).unwrap_or(0)
    }

    /// Advance the checkpoint and persist it
    ///
    /// Offsets are monotonically non-decreasing and bounded by the snapshot
    /// length; anything else is a logic error surfaced loudly.
    pub fn set_offset(&mut self, pair: &PairId, offset: u64) -> Result<()> {
        let key = pair.to_string();
        let entry = self
            .state
            .pairs
            .get_mut(&key)
            .ok_or_else(|| ReshardError::State(format!("no snapshot for {}", pair)))?;

        if offset < entry.checkpoint {
            return Err(ReshardError::State(format!(
                "checkpoint for {} would regress: {} -> {}",
                pair, entry.checkpoint, offset
            )));
        }
        if offset > entry.snapshot.len() as u64 {
            return Err(ReshardError::State(format!(
                "checkpoint for {} beyond snapshot: {} > {}",
                pair,
                offset,
                entry.snapshot.len()
            )));
        }

        entry.checkpoint = offset;
        self.save()
    }

    // =========================================================================
    // Flags
    // =========================================================================

    /// Whether the one-time target flush has already happened
    pub fn flushed_targets(&self) -> bool {
        self.state.flushed_targets
    }

    /// Record that every target database has been flushed
    pub fn set_flushed_targets(&mut self) -> Result<()> {
        self.state.flushed_targets = true;
        self.save()
    }

    // =========================================================================
    // Run Lock
    // =========================================================================

    /// Take the run lock, or fail immediately if another run holds it
    ///
    /// `create_new` makes the check-and-set a single atomic filesystem
    /// operation; there is no blocking or queueing.
    pub fn try_acquire_lock(&self) -> Result<RunLockGuard> {
        let lock_path = self.dir.join(LOCK_FILENAME);

        let lease = LockLease {
            owner: format!("pid-{}", std::process::id()),
            acquired_at_epoch_secs: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        };

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                // A lock file that fails to decode still means a lock exists
                let holder = self
                    .lock_lease()
                    .ok()
                    .flatten()
                    .map(|l| l.owner)
                    .unwrap_or_else(|| "unknown".to_string());
                return Err(ReshardError::AlreadyRunning(holder));
            }
            Err(e) => return Err(e.into()),
        };

        let bytes = bincode::serialize(&lease)
            .map_err(|e| ReshardError::Serialization(e.to_string()))?;
        file.write_all(&bytes)?;
        file.sync_all()?;

        Ok(RunLockGuard {
            lock_path,
            released: false,
        })
    }

    /// Current lock lease, if a lock file exists
    pub fn lock_lease(&self) -> Result<Option<LockLease>> {
        let lock_path = self.dir.join(LOCK_FILENAME);
        let bytes = match fs::read(&lock_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let lease = bincode::deserialize(&bytes).map_err(|e| {
            ReshardError::StateCorruption(format!("{}: {}", lock_path.display(), e))
        })?;
        Ok(Some(lease))
    }

    // =========================================================================
    // Clean
    // =========================================================================

    /// Drop all migration metadata for one pair
    pub fn clean(&mut self, pair: &PairId) -> Result<()> {
        self.state.pairs.remove(&pair.to_string());
        self.save()
    }

    /// Reset everything: snapshots, checkpoints, flags, and any stale lock
    pub fn clean_all(&mut self) -> Result<()> {
        self.state = StateFile::default();
        self.save()?;

        match fs::remove_file(self.dir.join(LOCK_FILENAME)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn pair(&self, pair: &PairId) -> Option<&PairState> {
        self.state.pairs.get(&pair.to_string())
    }

    /// Persist the state file: write to a temp file, then rename over the
    /// old one so readers never observe a partial write.
    fn save(&self) -> Result<()> {
        let bytes = bincode::serialize(&self.state)
            .map_err(|e| ReshardError::Serialization(e.to_string()))?;

        let tmp_path = self.dir.join(STATE_TMP_FILENAME);
        let final_path = self.dir.join(STATE_FILENAME);

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }
}
