//! Error types for the plugin bus.

use thiserror::Error;

/// Plugin bus error type.
#[derive(Error, Debug)]
pub enum BusError {
    /// Redis connection or operation error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Frame or payload could not be encoded
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Subject or subscription pattern is malformed
    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    /// Two actions registered under the same method name
    #[error("Action already registered: {0}")]
    DuplicateAction(String),

    /// The bus is no longer delivering messages
    #[error("Bus closed: {0}")]
    Closed(String),
}

/// Result type for plugin bus operations.
pub type BusResult<T> = Result<T, BusError>;
