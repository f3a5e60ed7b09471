//! Migration orchestration
//!
//! One invocation runs one bounded step of the migration:
//!
//! ```text
//! acquire lock ──► snapshot (if needed) ──► flush targets (first run only)
//!       ──► copy up to `limit` keys per pair ──► checkpoint ──► release
//! ```
//!
//! The tool is meant to be invoked repeatedly (cron, systemd timers) until
//! every pair's checkpoint reaches its snapshot length; after that, runs
//! are no-ops. Crash anywhere mid-run and the checkpoint simply hasn't
//! advanced for the interrupted batch; the next run re-copies it, which is
//! safe because every copy is an idempotent overwrite.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use tracing::{debug, info};

use crate::client::{Connector, KvClient};
use crate::config::{MigrationConfig, PairId, SourceAddr};
use crate::copier::{copy_key, CopyOutcome};
use crate::error::Result;
use crate::router;
use crate::snapshot::ensure_snapshot;
use crate::state::CheckpointStore;

/// Phase of a single run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Locking,
    Snapshotting,
    Flushing,
    Copying,
    Checkpointing,
    Released,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Locking => write!(f, "locking"),
            RunPhase::Snapshotting => write!(f, "snapshotting"),
            RunPhase::Flushing => write!(f, "flushing"),
            RunPhase::Copying => write!(f, "copying"),
            RunPhase::Checkpointing => write!(f, "checkpointing"),
            RunPhase::Released => write!(f, "released"),
        }
    }
}

/// Outcome of one run for one (source, db) pair
#[derive(Debug, Clone)]
pub struct PairReport {
    pub pair: PairId,
    /// Keys reproduced on a target this run
    pub copied: u64,
    /// Keys skipped because they vanished since the snapshot
    pub skipped: u64,
    /// Checkpoint after this run
    pub checkpoint: u64,
    /// Total keys in the frozen snapshot
    pub snapshot_len: u64,
}

impl PairReport {
    /// Whether this pair has nothing left to migrate
    pub fn converged(&self) -> bool {
        self.checkpoint >= self.snapshot_len
    }
}

/// Outcome of one orchestrated run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub pairs: Vec<PairReport>,
    /// Whether this run performed the one-time target flush
    pub flushed_targets: bool,
}

impl RunReport {
    /// Whether the whole migration has converged
    pub fn converged(&self) -> bool {
        self.pairs.iter().all(PairReport::converged)
    }

    /// Keys copied across all pairs this run
    pub fn total_copied(&self) -> u64 {
        self.pairs.iter().map(|p| p.copied).sum()
    }
}

/// Drives one migration step per call
///
/// Owns the configuration, the metadata store, and the connector; the
/// connector decides which backend the engine talks to.
pub struct Migrator<C: Connector> {
    config: MigrationConfig,
    store: CheckpointStore,
    connector: C,
}

impl<C: Connector> Migrator<C> {
    /// Validate the config and open the metadata store
    pub fn new(config: MigrationConfig, connector: C) -> Result<Self> {
        config.validate()?;
        let store = CheckpointStore::open(&config.state_dir)?;
        Ok(Self {
            config,
            store,
            connector,
        })
    }

    /// Run one bounded migration step
    ///
    /// Fails fast with `AlreadyRunning` if another invocation holds the
    /// lock. The lock is released on every exit path, including errors.
    pub fn run(&mut self) -> Result<RunReport> {
        info!(phase = %RunPhase::Locking, "starting migration run");
        let guard = self.store.try_acquire_lock()?;

        let result = self.run_locked();

        match result {
            Ok(report) => {
                guard.release()?;
                info!(
                    phase = %RunPhase::Released,
                    copied = report.total_copied(),
                    converged = report.converged(),
                    "run complete"
                );
                Ok(report)
            }
            Err(e) => {
                // Guard drop releases the lock so the next run isn't blocked
                drop(guard);
                Err(e)
            }
        }
    }

    /// Reset all migration metadata, allowing a fresh migration to start
    pub fn clean(&mut self) -> Result<()> {
        info!("cleaning migration state");
        self.store.clean_all()
    }

    /// The underlying metadata store (for inspection)
    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// The configuration this migrator runs with
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    // =========================================================================
    // Run Phases
    // =========================================================================

    fn run_locked(&mut self) -> Result<RunReport> {
        self.check_backends()?;
        self.snapshot_phase()?;
        let flushed_targets = self.flush_phase()?;

        info!(phase = %RunPhase::Copying, limit = self.config.limit, "copying batches");
        let mut pairs = Vec::new();
        for (source, db) in self.config.pairs() {
            pairs.push(self.copy_pair(&source, db)?);
        }

        Ok(RunReport {
            pairs,
            flushed_targets,
        })
    }

    /// Ping every configured server before mutating anything; an unreachable
    /// or incompatible backend fails the whole run up front.
    fn check_backends(&self) -> Result<()> {
        let probe_db = self.config.databases[0];

        for source in &self.config.sources {
            let mut conn = self.connector.connect(&source.host, source.port, probe_db)?;
            conn.ping()?;
        }
        for target in &self.config.targets {
            let mut conn = self.connector.connect(&target.host, target.port, probe_db)?;
            conn.ping()?;
        }

        Ok(())
    }

    /// Ensure every configured pair has its frozen key snapshot
    fn snapshot_phase(&mut self) -> Result<()> {
        info!(phase = %RunPhase::Snapshotting, "ensuring snapshots");

        for (source, db) in self.config.pairs() {
            let pair = PairId::new(&source, db);
            if self.store.have_snapshot(&pair) {
                continue;
            }
            let mut conn = self.connector.connect(&source.host, source.port, db)?;
            ensure_snapshot(&mut self.store, &pair, &mut conn)?;
        }

        Ok(())
    }

    /// Flush every target database exactly once across all invocations
    fn flush_phase(&mut self) -> Result<bool> {
        if self.store.flushed_targets() {
            return Ok(false);
        }

        info!(phase = %RunPhase::Flushing, "flushing target databases (first run)");
        for target in &self.config.targets {
            for &db in &self.config.databases {
                let mut conn = self.connector.connect(&target.host, target.port, db)?;
                conn.flush_db()?;
                debug!(node = %target, db, "target database flushed");
            }
        }

        self.store.set_flushed_targets()?;
        Ok(true)
    }

    /// Copy the next batch for one pair and advance its checkpoint
    fn copy_pair(&mut self, source: &SourceAddr, db: u32) -> Result<PairReport> {
        let pair = PairId::new(source, db);
        let snapshot_len = self.store.snapshot_len(&pair);
        let checkpoint = self.store.offset(&pair);

        // Terminal state: everything in the snapshot has been migrated
        if checkpoint >= snapshot_len {
            return Ok(PairReport {
                pair,
                copied: 0,
                skipped: 0,
                checkpoint,
                snapshot_len,
            });
        }

        let end = snapshot_len.min(checkpoint + self.config.limit as u64);
        let batch: Vec<Bytes> =
            self.store.snapshot(&pair)[checkpoint as usize..end as usize].to_vec();

        let mut source_conn = self.connector.connect(&source.host, source.port, db)?;

        // One lazily opened connection per target node, reused for the batch
        let mut target_conns: HashMap<usize, C::Conn> = HashMap::new();

        let mut copied = 0u64;
        let mut skipped = 0u64;

        for key in &batch {
            let idx = router::route(key, self.config.targets.len());
            let node = &self.config.targets[idx];

            let target_conn = match target_conns.entry(idx) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    entry.insert(self.connector.connect(&node.host, node.port, db)?)
                }
            };

            match copy_key(key, &mut source_conn, target_conn)? {
                CopyOutcome::Copied(_) => copied += 1,
                CopyOutcome::Skipped => skipped += 1,
            }
        }

        // The checkpoint moves only after the whole batch landed; a crash
        // above re-runs the same batch next time
        info!(phase = %RunPhase::Checkpointing, pair = %pair, checkpoint = end, "batch complete");
        self.store.set_offset(&pair, end)?;

        debug!(
            pair = %pair,
            copied,
            skipped,
            checkpoint = end,
            snapshot_len,
            "pair batch finished"
        );

        Ok(PairReport {
            pair,
            copied,
            skipped,
            checkpoint: end,
            snapshot_len,
        })
    }
}
