//! reshardkv-copy binary
//!
//! Single-target copy: the same engine with a cluster of one node. Useful
//! for draining one server into another without resharding.

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use reshardkv::client::tcp::TcpConnector;
use reshardkv::{MigrationConfig, Migrator, ReshardError, SourceAddr, TargetNode};

/// Copy key-value data from one server to another
#[derive(Parser, Debug)]
#[command(name = "reshardkv-copy")]
#[command(about = "Resumable single-target copy for key-value servers")]
#[command(version)]
struct Args {
    /// Source server, host:port
    #[arg(long)]
    source: String,

    /// Target server, host:port
    #[arg(long)]
    target: String,

    /// Database indices to copy
    #[arg(long, value_delimiter = ',', required = true)]
    databases: Vec<u32>,

    /// Max keys copied per database per invocation
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
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reshardkv=debug"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    tracing::info!("reshardkv-copy v{}", reshardkv::VERSION);

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
                tracing::info!("copy converged; further runs are no-ops");
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
    let source = SourceAddr::parse(&args.source)?;
    let target_addr = SourceAddr::parse(&args.target)?;

    // The engine routes across a cluster of exactly one node
    let target = TargetNode {
        name: "copy-target".to_string(),
        host: target_addr.host,
        port: target_addr.port,
    };

    Ok(MigrationConfig::builder()
        .source(source)
        .target(target)
        .databases(args.databases.clone())
        .limit(args.limit)
        .state_dir(&args.state_dir)
        .build())
}
