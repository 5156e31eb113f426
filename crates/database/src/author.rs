//! Tracked author persistence.

use sqlx::SqlitePool;

use crate::models::Author;
use crate::retry::with_retry;
use crate::Result;

/// Record an author, filling in the display name only while it is unset.
///
/// The first non-null name learned for an author is kept.
pub async fn upsert_author(pool: &SqlitePool, id: i64, display_name: Option<&str>) -> Result<()> {
    with_retry("upsert_author", move || {
        sqlx::query(
            r#"
            INSERT INTO authors (author_id, author_name)
            VALUES (?, ?)
            ON CONFLICT(author_id) DO UPDATE SET
                author_name = excluded.author_name
            WHERE authors.author_name IS NULL
            "#,
        )
        .bind(id)
        .bind(display_name)
        .execute(pool)
    })
    .await?;

    Ok(())
}

/// Insert seed author IDs without a name, leaving existing rows untouched.
pub async fn seed_authors(pool: &SqlitePool, ids: &[i64]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for id in ids {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO authors (author_id, author_name)
            VALUES (?, NULL)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    tracing::debug!("Seeded {} tracked authors", ids.len());
    Ok(())
}

/// Get an author by ID.
pub async fn get_author(pool: &SqlitePool, id: i64) -> Result<Option<Author>> {
    let author = sqlx::query_as::<_, Author>(
        r#"
        SELECT author_id, author_name
        FROM authors
        WHERE author_id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(author)
}

/// List the IDs of every known author.
pub async fn list_author_ids(pool: &SqlitePool) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT author_id FROM authors ORDER BY author_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(ids)
}
