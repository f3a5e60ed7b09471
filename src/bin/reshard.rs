//! reshardkv binary
//!
//! Runs one bounded migration step against a sharded target cluster. Meant
//! to be invoked repeatedly (e.g. from cron) until the migration converges.

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use reshardkv::client::tcp::TcpConnector;
use reshardkv::{MigrationConfig, Migrator, ReshardError, SourceAddr, TargetNode};

/// Reshard key-value data onto a differently-sized target cluster
#[derive(Parser, Debug)]
#[command(name = "reshardkv")]
#[command(about = "Resumable key-migration tool for key-value clusters")]
#[command(version)]
struct Args {
    /// Source servers, host:port
    #[arg(long, value_delimiter = ',', required = true)]
    sources: Vec<String>,

    /// Target nodes in routing order, name#host:port
    #[arg(long, value_delimiter = ',', required = true)]
    targets: Vec<String>,

    /// Database indices to migrate
    #[arg(long, value_delimiter = ',', required = true)]
    databases: Vec<u32>,

    /// Max keys migrated per (source, db) pair per invocation
    #[arg(long, default_value_t = reshardkv::config::DEFAULT_LIMIT)]
    limit: usize,

    /// Directory holding migration metadata
    #[arg(long, default_value = "./reshard_state")]
    state_dir: String,

    /// Reset all migration metadata and exit
    #[arg(long)]
    clean: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reshardkv=debug"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    tracing::info!("reshardkv v{}", reshardkv::VERSION);

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let mut migrator = match Migrator::new(config, TcpConnector::new()) {
        Ok(m) => m,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    if args.clean {
        if let Err(e) = migrator.clean() {
            tracing::error!("clean failed: {}", e);
            std::process::exit(1);
        }
        tracing::info!("migration state cleaned");
        return;
    }

    match migrator.run() {
        Ok(report) => {
            for pair in &report.pairs {
                tracing::info!(
                    "{}: copied {} skipped {} checkpoint {}/{}",
                    pair.pair,
                    pair.copied,
                    pair.skipped,
                    pair.checkpoint,
                    pair.snapshot_len
                );
            }
            if report.converged() {
                tracing::info!("migration converged; further runs are no-ops");
            }
        }
        Err(ReshardError::AlreadyRunning(holder)) => {
            tracing::warn!("another run holds the lock ({}); retry later", holder);
            std::process::exit(2);
        }
        Err(e) => {
            tracing::error!("run failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn build_config(args: &Args) -> reshardkv::Result<MigrationConfig> {
    let sources = args
        .sources
        .iter()
        .map(|s| SourceAddr::parse(s))
        .collect::<reshardkv::Result<Vec<_>>>()?;

    let targets = args
        .targets
        .iter()
        .map(|t| TargetNode::parse(t))
        .collect::<reshardkv::Result<Vec<_>>>()?;

    Ok(MigrationConfig::builder()
        .sources(sources)
        .targets(targets)
        .databases(args.databases.clone())
        .limit(args.limit)
        .state_dir(&args.state_dir)
        .build())
}
