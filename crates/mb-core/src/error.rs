//! # AppError
//!
//! Centralized error handling for the msgboard engine.
//! Maps storage and validation failures to actionable error types.

use thiserror::Error;

/// The primary error type for all mb-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// The storage handle was used before `StorageHandle::init` completed.
    #[error("storage connection has not been initialized")]
    ConnectionNotReady,

    /// Resource not found (e.g., Thread, Reply)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// A thread or reply ID that does not parse.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Validation failure (e.g., empty text, missing delete password)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Delete password mismatch
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Infrastructure failure (e.g., DB down, corrupt document)
    #[error("internal service error: {0}")]
    Storage(#[from] anyhow::Error),

    /// Concurrent writers kept winning the compare-and-swap race
    #[error("conflict: {0}")]
    Conflict(String),
}

/// A specialized Result type for msgboard logic.
pub type Result<T> = std::result::Result<T, AppError>;
