//! Error types for FUQLdb
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using FuqlError
pub type Result<T> = std::result::Result<T, FuqlError>;

/// Unified error type for FUQLdb operations
#[derive(Debug, Error)]
pub enum FuqlError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Command Errors (rejected before reaching the dispatcher)
    // -------------------------------------------------------------------------
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    // -------------------------------------------------------------------------
    // Data Access Errors
    // -------------------------------------------------------------------------
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Incorrect password")]
    IncorrectPassword,

    // -------------------------------------------------------------------------
    // Session Errors
    // -------------------------------------------------------------------------
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    // -------------------------------------------------------------------------
    // Persistence Errors
    // -------------------------------------------------------------------------
    #[error("Persistence error: {0}")]
    Persistence(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Dispatcher Errors
    // -------------------------------------------------------------------------
    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Dispatcher has shut down")]
    Shutdown,
}
