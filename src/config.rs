//! Configuration for a migration run
//!
//! Holds the source servers, the ordered target cluster, the selected
//! database indices, and the per-run batch limit. All validation happens
//! here, before any server is contacted.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ReshardError, Result};

/// Default number of keys migrated per (source, db) pair per invocation
pub const DEFAULT_LIMIT: usize = 10_000;

/// Address of a source server, written as `host:port`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceAddr {
    pub host: String,
    pub port: u16,
}

impl SourceAddr {
    /// Parse a `host:port` specifier
    pub fn parse(spec: &str) -> Result<Self> {
        let (host, port) = spec.rsplit_once(':').ok_or_else(|| {
            ReshardError::Config(format!("malformed source '{}': expected host:port", spec))
        })?;

        if host.is_empty() {
            return Err(ReshardError::Config(format!(
                "malformed source '{}': empty host",
                spec
            )));
        }

        let port: u16 = port.parse().map_err(|_| {
            ReshardError::Config(format!("malformed source '{}': invalid port '{}'", spec, port))
        })?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for SourceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One node of the target cluster, written as `name#host:port`
///
/// The position of a node in the configured target list is part of the
/// routing function: reordering the list reassigns keys. Treat the list
/// order as durable configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetNode {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl TargetNode {
    /// Parse a `name#host:port` specifier
    pub fn parse(spec: &str) -> Result<Self> {
        let (name, addr) = spec.split_once('#').ok_or_else(|| {
            ReshardError::Config(format!(
                "malformed target '{}': expected name#host:port",
                spec
            ))
        })?;

        if name.is_empty() {
            return Err(ReshardError::Config(format!(
                "malformed target '{}': empty name",
                spec
            )));
        }

        let addr = SourceAddr::parse(addr).map_err(|_| {
            ReshardError::Config(format!(
                "malformed target '{}': expected name#host:port",
                spec
            ))
        })?;

        Ok(Self {
            name: name.to_string(),
            host: addr.host,
            port: addr.port,
        })
    }

    /// The node's `host:port` address
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for TargetNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}:{}", self.name, self.host, self.port)
    }
}

/// Identifies one (source server, database) pair, written as `host:port:db`
///
/// This is the unit of snapshot and checkpoint tracking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairId {
    pub host: String,
    pub port: u16,
    pub db: u32,
}

impl PairId {
    pub fn new(source: &SourceAddr, db: u32) -> Self {
        Self {
            host: source.host.clone(),
            port: source.port,
            db,
        }
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.host, self.port, self.db)
    }
}

/// Main configuration for a migration
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    // -------------------------------------------------------------------------
    // Topology
    // -------------------------------------------------------------------------
    /// Source servers to drain
    pub sources: Vec<SourceAddr>,

    /// Ordered target cluster; list order is part of the routing function
    pub targets: Vec<TargetNode>,

    /// Database indices to migrate (each applies to every source and target)
    pub databases: Vec<u32>,

    // -------------------------------------------------------------------------
    // Run Behavior
    // -------------------------------------------------------------------------
    /// Max keys copied per (source, db) pair per invocation
    pub limit: usize,

    /// Directory holding migration metadata (snapshots, checkpoints, lock)
    pub state_dir: PathBuf,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            targets: Vec::new(),
            databases: Vec::new(),
            limit: DEFAULT_LIMIT,
            state_dir: PathBuf::from("./reshard_state"),
        }
    }
}

impl MigrationConfig {
    /// Create a new config builder
    pub fn builder() -> MigrationConfigBuilder {
        MigrationConfigBuilder::default()
    }

    /// Every configured (source, db) pair, in configuration order
    pub fn pairs(&self) -> Vec<(SourceAddr, u32)> {
        let mut pairs = Vec::with_capacity(self.sources.len() * self.databases.len());
        for source in &self.sources {
            for &db in &self.databases {
                pairs.push((source.clone(), db));
            }
        }
        pairs
    }

    /// Validate the configuration
    ///
    /// All errors here are fatal and reported before any server is touched.
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(ReshardError::Config("no source servers configured".to_string()));
        }

        if self.targets.is_empty() {
            return Err(ReshardError::Config("no target nodes configured".to_string()));
        }

        if self.databases.is_empty() {
            return Err(ReshardError::Config("empty database list".to_string()));
        }

        if self.limit == 0 {
            return Err(ReshardError::Config("limit must be at least 1".to_string()));
        }

        // A server cannot be both drained and written to
        for source in &self.sources {
            for target in &self.targets {
                if source.host == target.host && source.port == target.port {
                    return Err(ReshardError::Config(format!(
                        "source and target are the same server: {}",
                        source
                    )));
                }
            }
        }

        // Duplicate node names make reports and diagnostics ambiguous
        for (i, target) in self.targets.iter().enumerate() {
            if self.targets[..i].iter().any(|t| t.name == target.name) {
                return Err(ReshardError::Config(format!(
                    "duplicate target node name '{}'",
                    target.name
                )));
            }
        }

        Ok(())
    }
}

/// Builder for MigrationConfig
#[derive(Default)]
pub struct MigrationConfigBuilder {
    config: MigrationConfig,
}

impl MigrationConfigBuilder {
    /// Add a source server
    pub fn source(mut self, source: SourceAddr) -> Self {
        self.config.sources.push(source);
        self
    }

    /// Set all source servers at once
    pub fn sources(mut self, sources: Vec<SourceAddr>) -> Self {
        self.config.sources = sources;
        self
    }

    /// Add a target node (appended at the end of the routing order)
    pub fn target(mut self, target: TargetNode) -> Self {
        self.config.targets.push(target);
        self
    }

    /// Set the full ordered target cluster at once
    pub fn targets(mut self, targets: Vec<TargetNode>) -> Self {
        self.config.targets = targets;
        self
    }

    /// Set the database indices to migrate
    pub fn databases(mut self, databases: Vec<u32>) -> Self {
        self.config.databases = databases;
        self
    }

    /// Set the per-pair batch limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.config.limit = limit;
        self
    }

    /// Set the metadata directory
    pub fn state_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.state_dir = path.into();
        self
    }

    pub fn build(self) -> MigrationConfig {
        self.config
    }
}
