//! Per-channel crawl cursors.
//!
//! The stored message ID only ever moves forward: the upsert ignores any
//! value that is not strictly greater than what is already stored.

use sqlx::SqlitePool;

use crate::models::ChannelCursor;
use crate::retry::with_retry;
use crate::Result;

/// Get the cursor for a channel.
pub async fn get_cursor(pool: &SqlitePool, channel_id: i64) -> Result<Option<ChannelCursor>> {
    let cursor = sqlx::query_as::<_, ChannelCursor>(
        r#"
        SELECT chan_id, last_seen_message_id, updated_at
        FROM channel_cursors
        WHERE chan_id = ?
        "#,
    )
    .bind(channel_id)
    .fetch_optional(pool)
    .await?;

    Ok(cursor)
}

/// Move a channel's cursor forward to `message_id`.
///
/// Returns `true` if the stored value changed.
pub async fn advance_cursor(pool: &SqlitePool, channel_id: i64, message_id: i64) -> Result<bool> {
    let result = with_retry("advance_cursor", move || {
        sqlx::query(
            r#"
            INSERT INTO channel_cursors (chan_id, last_seen_message_id)
            VALUES (?, ?)
            ON CONFLICT(chan_id) DO UPDATE SET
                last_seen_message_id = excluded.last_seen_message_id,
                updated_at = datetime('now')
            WHERE excluded.last_seen_message_id > channel_cursors.last_seen_message_id
            "#,
        )
        .bind(channel_id)
        .bind(message_id)
        .execute(pool)
    })
    .await?;

    Ok(result.rows_affected() == 1)
}
