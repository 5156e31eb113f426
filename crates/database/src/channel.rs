//! Source channel records and accessibility facts.

use sqlx::SqlitePool;

use crate::models::ChannelRecord;
use crate::retry::with_retry;
use crate::Result;

/// Record a visited channel.
///
/// Known names and parents are kept when the new record leaves them unset.
pub async fn upsert_channel(pool: &SqlitePool, record: &ChannelRecord) -> Result<()> {
    with_retry("upsert_channel", move || {
        sqlx::query(
            r#"
            INSERT INTO channels (chan_id, name, parent_id, accessible)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(chan_id) DO UPDATE SET
                name = COALESCE(excluded.name, channels.name),
                parent_id = COALESCE(excluded.parent_id, channels.parent_id),
                accessible = excluded.accessible
            "#,
        )
        .bind(record.chan_id)
        .bind(&record.name)
        .bind(record.parent_id)
        .bind(record.accessible)
        .execute(pool)
    })
    .await?;

    Ok(())
}

/// Set only the accessibility flag, creating a bare record if needed.
pub async fn set_accessible(pool: &SqlitePool, chan_id: i64, accessible: bool) -> Result<()> {
    with_retry("set_accessible", move || {
        sqlx::query(
            r#"
            INSERT INTO channels (chan_id, accessible)
            VALUES (?, ?)
            ON CONFLICT(chan_id) DO UPDATE SET
                accessible = excluded.accessible
            "#,
        )
        .bind(chan_id)
        .bind(accessible)
        .execute(pool)
    })
    .await?;

    Ok(())
}

/// Get a channel record by ID.
pub async fn get_channel(pool: &SqlitePool, chan_id: i64) -> Result<Option<ChannelRecord>> {
    let record = sqlx::query_as::<_, ChannelRecord>(
        r#"
        SELECT chan_id, name, parent_id, accessible
        FROM channels
        WHERE chan_id = ?
        "#,
    )
    .bind(chan_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// List the IDs of channels last seen as inaccessible.
pub async fn list_inaccessible(pool: &SqlitePool) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT chan_id FROM channels WHERE accessible = 0 ORDER BY chan_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(ids)
}
