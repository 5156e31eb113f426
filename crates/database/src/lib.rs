//! SQLite persistence layer for the BlueTracker relay.
//!
//! This crate stores relayed posts, tracked authors, display-name overrides,
//! per-channel crawl cursors and channel accessibility facts using SQLx with
//! SQLite. Writes are insert-if-absent or monotonic upserts, so concurrent
//! writers never duplicate rows.
//!
//! # Example
//!
//! ```no_run
//! use database::{post, Database, Post};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:bluetracker.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let stored = Post {
//!         id: 1383196587270078515,
//!         channel_id: 226045346399256576,
//!         author_id: 308821099863605249,
//!         timestamp_ms: 1_750_000_000_000,
//!         snippet: Some("Patch notes are up".to_string()),
//!         relayed: false,
//!     };
//!     let inserted = post::insert_post(db.pool(), &stored).await?;
//!     assert!(inserted);
//!
//!     Ok(())
//! }
//! ```

pub mod author;
pub mod channel;
pub mod cursor;
pub mod error;
pub mod gm_name;
pub mod models;
pub mod post;
pub mod retry;
pub mod stats;

pub use error::{DatabaseError, Result};
pub use models::{Author, ChannelCursor, ChannelRecord, GmName, Post};
pub use stats::DbStats;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    const DEFAULT_POOL_SIZE: u32 = 5;

    /// How long a connection waits on a held lock before SQLite reports busy.
    const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// // File database
    /// let db = database::Database::connect("sqlite:data/bluetracker.db?mode=rwc").await?;
    ///
    /// // In-memory database (for testing)
    /// let db = database::Database::connect("sqlite::memory:").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    ///
    /// The file is opened in WAL mode so external readers (the search UI and
    /// the backup exporter) can snapshot it while the relay is writing.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Self::BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(
            "Connected to database: {} (pool size: {})",
            url,
            pool_size
        );

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
