//! # reshardkv
//!
//! A resumable key-migration tool that reshards data from a set of source
//! key-value servers onto a differently-sized target cluster:
//! - Deterministic CRC32 routing of every key to its target node
//! - Frozen per-database key snapshots, scanned exactly once
//! - Durable checkpoints, so repeated invocations converge step by step
//! - Type-aware, idempotent copies (safe to re-run after any crash)
//! - One-time target flush guarded across invocations
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     MigrationOrchestrator                     │
//! │      lock → snapshot → flush(once) → copy → checkpoint        │
//! └───────┬──────────────────┬──────────────────────┬────────────┘
//!         │                  │                      │
//!         ▼                  ▼                      ▼
//!  ┌────────────┐    ┌──────────────┐      ┌──────────────────┐
//!  │ Checkpoint │    │ ShardRouter  │      │ TypeAwareCopier  │
//!  │   Store    │    │ (crc32 % N)  │      │ (per-structure)  │
//!  └─────┬──────┘    └──────────────┘      └────────┬─────────┘
//!        │                                          │
//!        ▼                                          ▼
//!  ┌────────────┐                          ┌──────────────────┐
//!  │ state dir  │                          │  KvClient trait  │
//!  │ (bincode)  │                          │ (memory | tcp)   │
//!  └────────────┘                          └──────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod client;
pub mod router;
pub mod state;
pub mod snapshot;
pub mod copier;
pub mod orchestrator;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ReshardError, Result};
pub use config::{MigrationConfig, PairId, SourceAddr, TargetNode};
pub use orchestrator::{Migrator, RunReport};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of reshardkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
