//! Post persistence.
//!
//! Every write is insert-if-absent keyed on the message ID, so the crawler
//! and the live handler can both see the same message without creating a
//! second row.

use sqlx::SqlitePool;

use crate::models::Post;
use crate::retry::with_retry;
use crate::Result;

/// Insert a post unless a row with the same ID exists.
///
/// Returns `true` if a new row was written.
pub async fn insert_post(pool: &SqlitePool, post: &Post) -> Result<bool> {
    let result = with_retry("insert_post", move || {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO posts (id, chan_id, author_id, ts, content, replayed)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(post.id)
        .bind(post.channel_id)
        .bind(post.author_id)
        .bind(post.timestamp_ms)
        .bind(&post.snippet)
        .bind(post.relayed)
        .execute(pool)
    })
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Claim a post for relaying.
///
/// Inserts the post already marked relayed, or flips an existing unrelayed
/// row. Returns `false` if the post had already been relayed, in which case
/// the caller must not send it again.
pub async fn claim_post(pool: &SqlitePool, post: &Post) -> Result<bool> {
    let result = with_retry("claim_post", move || {
        sqlx::query(
            r#"
            INSERT INTO posts (id, chan_id, author_id, ts, content, replayed)
            VALUES (?, ?, ?, ?, ?, 1)
            ON CONFLICT(id) DO UPDATE SET replayed = 1
            WHERE posts.replayed = 0
            "#,
        )
        .bind(post.id)
        .bind(post.channel_id)
        .bind(post.author_id)
        .bind(post.timestamp_ms)
        .bind(&post.snippet)
        .execute(pool)
    })
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Check whether a post ID is already stored.
pub async fn post_exists(pool: &SqlitePool, id: i64) -> Result<bool> {
    let exists = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?)
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await?;

    Ok(exists == 1)
}

/// Get a post by ID.
pub async fn get_post(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, chan_id, author_id, ts, content, replayed
        FROM posts
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(post)
}

/// List every post that has not been relayed yet, oldest first.
pub async fn list_unrelayed(pool: &SqlitePool) -> Result<Vec<Post>> {
    let posts = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, chan_id, author_id, ts, content, replayed
        FROM posts
        WHERE replayed = 0
        ORDER BY ts ASC, id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(posts)
}

/// Count posts that have not been relayed yet.
pub async fn count_unrelayed(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM posts WHERE replayed = 0
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Mark a post as relayed.
///
/// Returns `true` if the flag flipped; `false` if the post was already
/// relayed or does not exist.
pub async fn mark_relayed(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = with_retry("mark_relayed", move || {
        sqlx::query(
            r#"
            UPDATE posts
            SET replayed = 1
            WHERE id = ? AND replayed = 0
            "#,
        )
        .bind(id)
        .execute(pool)
    })
    .await?;

    Ok(result.rows_affected() == 1)
}
