//! Error types for the relay engine.

use database::DatabaseError;
use discord_client::PlatformError;
use thiserror::Error;

/// Errors that can occur while crawling or relaying.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Store failure.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Remote platform failure.
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    /// No destination could be provisioned for a source channel.
    #[error("no mirror for channel {0}")]
    NoMirror(u64),

    /// Invalid engine configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
