//! Fixed display-name overrides.
//!
//! Rows are seed data; the relay only reads them while running.

use sqlx::SqlitePool;

use crate::models::GmName;
use crate::Result;

/// Create or replace an override.
pub async fn upsert_gm_name(
    pool: &SqlitePool,
    author_id: i64,
    name: &str,
    notes: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO gm_names (author_id, gm_name, notes)
        VALUES (?, ?, ?)
        ON CONFLICT(author_id) DO UPDATE SET
            gm_name = excluded.gm_name,
            notes = COALESCE(excluded.notes, gm_names.notes)
        "#,
    )
    .bind(author_id)
    .bind(name)
    .bind(notes)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get the override for an author.
pub async fn get_gm_name(pool: &SqlitePool, author_id: i64) -> Result<Option<GmName>> {
    let record = sqlx::query_as::<_, GmName>(
        r#"
        SELECT author_id, gm_name, notes
        FROM gm_names
        WHERE author_id = ?
        "#,
    )
    .bind(author_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}
