//! Error types for reshardkv
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using ReshardError
pub type Result<T> = std::result::Result<T, ReshardError>;

/// Unified error type for reshardkv operations
#[derive(Debug, Error)]
pub enum ReshardError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // State Store Errors
    // -------------------------------------------------------------------------
    #[error("State error: {0}")]
    State(String),

    #[error("State corruption detected: {0}")]
    StateCorruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Migration already running (lock held by {0})")]
    AlreadyRunning(String),

    // -------------------------------------------------------------------------
    // Client Errors
    // -------------------------------------------------------------------------
    #[error("Client error: {0}")]
    Client(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Key not found")]
    KeyNotFound,
}
