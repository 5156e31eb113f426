//! Store-wide counters.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::Result;

/// Row counts across the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DbStats {
    pub posts: i64,
    pub authors: i64,
    pub unrelayed: i64,
    pub channels: i64,
    pub inaccessible_channels: i64,
}

/// Collect row counts.
pub async fn db_stats(pool: &SqlitePool) -> Result<DbStats> {
    let (posts, authors, unrelayed, channels, inaccessible_channels) =
        sqlx::query_as::<_, (i64, i64, i64, i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM posts),
                (SELECT COUNT(*) FROM authors),
                (SELECT COUNT(*) FROM posts WHERE replayed = 0),
                (SELECT COUNT(*) FROM channels),
                (SELECT COUNT(*) FROM channels WHERE accessible = 0)
            "#,
        )
        .fetch_one(pool)
        .await?;

    Ok(DbStats {
        posts,
        authors,
        unrelayed,
        channels,
        inaccessible_channels,
    })
}
