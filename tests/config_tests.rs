//! Tests for migration configuration
//!
//! These tests verify:
//! - Parsing of source and target specifiers
//! - Validation of the assembled configuration
//! - That every misconfiguration is caught before any server is contacted

use reshardkv::{MigrationConfig, ReshardError, SourceAddr, TargetNode};

// =============================================================================
// Helper Functions
// =============================================================================

fn source(host: &str, port: u16) -> SourceAddr {
    SourceAddr {
        host: host.to_string(),
        port,
    }
}

fn target(name: &str, host: &str, port: u16) -> TargetNode {
    TargetNode {
        name: name.to_string(),
        host: host.to_string(),
        port,
    }
}

fn valid_config() -> MigrationConfig {
    MigrationConfig::builder()
        .source(source("src-a", 7000))
        .target(target("shard-1", "tgt-a", 7100))
        .target(target("shard-2", "tgt-b", 7100))
        .databases(vec![0])
        .build()
}

// =============================================================================
// Parsing Tests
// =============================================================================

#[test]
fn test_parse_source() {
    let addr = SourceAddr::parse("cache-01:6380").unwrap();
    assert_eq!(addr.host, "cache-01");
    assert_eq!(addr.port, 6380);
}

#[test]
fn test_parse_source_rejects_missing_port() {
    assert!(matches!(
        SourceAddr::parse("cache-01"),
        Err(ReshardError::Config(_))
    ));
}

#[test]
fn test_parse_source_rejects_bad_port() {
    assert!(matches!(
        SourceAddr::parse("cache-01:notaport"),
        Err(ReshardError::Config(_))
    ));
    assert!(matches!(
        SourceAddr::parse("cache-01:99999"),
        Err(ReshardError::Config(_))
    ));
}

#[test]
fn test_parse_source_rejects_empty_host() {
    assert!(matches!(
        SourceAddr::parse(":6380"),
        Err(ReshardError::Config(_))
    ));
}

#[test]
fn test_parse_target() {
    let node = TargetNode::parse("shard-1#cache-11:6380").unwrap();
    assert_eq!(node.name, "shard-1");
    assert_eq!(node.host, "cache-11");
    assert_eq!(node.port, 6380);
    assert_eq!(node.addr(), "cache-11:6380");
}

#[test]
fn test_parse_target_rejects_missing_name() {
    // Plain host:port is a source specifier, not a target specifier
    assert!(matches!(
        TargetNode::parse("cache-11:6380"),
        Err(ReshardError::Config(_))
    ));
    assert!(matches!(
        TargetNode::parse("#cache-11:6380"),
        Err(ReshardError::Config(_))
    ));
}

#[test]
fn test_parse_target_rejects_malformed_addr() {
    assert!(matches!(
        TargetNode::parse("shard-1#cache-11"),
        Err(ReshardError::Config(_))
    ));
}

#[test]
fn test_display_round_trip() {
    let addr = SourceAddr::parse("cache-01:6380").unwrap();
    assert_eq!(addr.to_string(), "cache-01:6380");

    let node = TargetNode::parse("shard-1#cache-11:6380").unwrap();
    assert_eq!(node.to_string(), "shard-1#cache-11:6380");
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_valid_config_passes() {
    valid_config().validate().unwrap();
}

#[test]
fn test_empty_sources_rejected() {
    let config = MigrationConfig::builder()
        .target(target("shard-1", "tgt-a", 7100))
        .databases(vec![0])
        .build();
    assert!(matches!(config.validate(), Err(ReshardError::Config(_))));
}

#[test]
fn test_empty_targets_rejected() {
    let config = MigrationConfig::builder()
        .source(source("src-a", 7000))
        .databases(vec![0])
        .build();
    assert!(matches!(config.validate(), Err(ReshardError::Config(_))));
}

#[test]
fn test_empty_database_list_rejected() {
    let config = MigrationConfig::builder()
        .source(source("src-a", 7000))
        .target(target("shard-1", "tgt-a", 7100))
        .build();
    assert!(matches!(config.validate(), Err(ReshardError::Config(_))));
}

#[test]
fn test_zero_limit_rejected() {
    let config = MigrationConfig::builder()
        .source(source("src-a", 7000))
        .target(target("shard-1", "tgt-a", 7100))
        .databases(vec![0])
        .limit(0)
        .build();
    assert!(matches!(config.validate(), Err(ReshardError::Config(_))));
}

#[test]
fn test_source_equal_to_target_rejected() {
    let config = MigrationConfig::builder()
        .source(source("cache-01", 6380))
        .target(target("shard-1", "cache-01", 6380))
        .databases(vec![0])
        .build();
    assert!(matches!(config.validate(), Err(ReshardError::Config(_))));
}

#[test]
fn test_duplicate_target_names_rejected() {
    let config = MigrationConfig::builder()
        .source(source("src-a", 7000))
        .target(target("shard-1", "tgt-a", 7100))
        .target(target("shard-1", "tgt-b", 7100))
        .databases(vec![0])
        .build();
    assert!(matches!(config.validate(), Err(ReshardError::Config(_))));
}

// =============================================================================
// Pair Enumeration Tests
// =============================================================================

#[test]
fn test_pairs_cover_every_source_and_database() {
    let config = MigrationConfig::builder()
        .source(source("src-a", 7000))
        .source(source("src-b", 7000))
        .target(target("shard-1", "tgt-a", 7100))
        .databases(vec![0, 1, 5])
        .build();

    let pairs = config.pairs();
    assert_eq!(pairs.len(), 6);

    // Configuration order: sources outer, databases inner
    assert_eq!(pairs[0].0.host, "src-a");
    assert_eq!(pairs[0].1, 0);
    assert_eq!(pairs[2].1, 5);
    assert_eq!(pairs[3].0.host, "src-b");
}
