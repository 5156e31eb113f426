//! Database error types.

use thiserror::Error;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx error (connection, query, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The database stayed locked through every retry.
    #[error("database busy during {operation} after {attempts} attempts")]
    Contention {
        operation: &'static str,
        attempts: u32,
    },
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
