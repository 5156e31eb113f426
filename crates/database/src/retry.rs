//! Bounded retry for writes that hit a locked database.
//!
//! SQLite reports `SQLITE_BUSY` / `SQLITE_LOCKED` when another connection
//! holds the write lock. Writers back off exponentially and give up after
//! [`MAX_ATTEMPTS`], surfacing [`DatabaseError::Contention`].

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{DatabaseError, Result};

/// Attempts made before a locked write is surfaced as contention.
pub const MAX_ATTEMPTS: u32 = 3;

/// Delay before the first retry; doubled on every further attempt.
pub const BASE_DELAY: Duration = Duration::from_millis(100);

/// Check whether an error means "someone else holds the lock".
pub fn is_contention(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db_err) = err else {
        return false;
    };

    // Primary codes 5 (BUSY) and 6 (LOCKED), plus their extended variants.
    let busy_code = db_err
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .map(|code| matches!(code & 0xff, 5 | 6))
        .unwrap_or(false);

    busy_code || db_err.message().to_lowercase().contains("locked")
}

/// Run `op` until it succeeds, fails with a non-contention error, or
/// [`MAX_ATTEMPTS`] is reached.
pub async fn with_retry<T, F, Fut>(operation: &'static str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if is_contention(&e) => {
                attempt += 1;
                if attempt >= MAX_ATTEMPTS {
                    return Err(DatabaseError::Contention {
                        operation,
                        attempts: attempt,
                    });
                }
                let delay = BASE_DELAY * 2u32.pow(attempt - 1);
                warn!(
                    "Database locked during {}, retrying in {:?} (attempt {}/{})",
                    operation, delay, attempt, MAX_ATTEMPTS
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(DatabaseError::Sqlx(e)),
        }
    }
}
