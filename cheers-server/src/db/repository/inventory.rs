//! Inventory Repository
//!
//! Counts only move through single conditional statements.

use sqlx::{Executor, Sqlite};

use super::RepoResult;
use shared::models::{GrantResult, InventoryItem};

/// Find the row for a (user, sticker) pair
pub async fn find<'e, E>(
    executor: E,
    user_id: &str,
    sticker_id: &str,
) -> RepoResult<Option<InventoryItem>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let item = sqlx::query_as::<_, InventoryItem>(
        "SELECT id, user_id, sticker_id, pack_id, quantity, created_at, updated_at \
         FROM inventory WHERE user_id = ? AND sticker_id = ?",
    )
    .bind(user_id)
    .bind(sticker_id)
    .fetch_optional(executor)
    .await?;
    Ok(item)
}

/// Upsert-increment by one, creating the row on first grant
pub async fn increment<'e, E>(
    executor: E,
    user_id: &str,
    sticker_id: &str,
    now: i64,
) -> RepoResult<GrantResult>
where
    E: Executor<'e, Database = Sqlite>,
{
    let (row_id, quantity): (i64, i64) = sqlx::query_as(
        r#"
        INSERT INTO inventory (user_id, sticker_id, quantity, created_at, updated_at)
        VALUES (?1, ?2, 1, ?3, ?3)
        ON CONFLICT(user_id, sticker_id) DO UPDATE SET
            quantity = quantity + 1,
            updated_at = excluded.updated_at
        RETURNING id, quantity
        "#,
    )
    .bind(user_id)
    .bind(sticker_id)
    .bind(now)
    .fetch_one(executor)
    .await?;
    Ok(GrantResult { row_id, quantity })
}

/// Decrement by one if at least one unit is available
///
/// `None` means the guard failed and nothing was written.
pub async fn decrement_if_available<'e, E>(
    executor: E,
    user_id: &str,
    sticker_id: &str,
    now: i64,
) -> RepoResult<Option<GrantResult>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<(i64, i64)> = sqlx::query_as(
        r#"
        UPDATE inventory
        SET quantity = quantity - 1, updated_at = ?3
        WHERE user_id = ?1 AND sticker_id = ?2 AND quantity >= 1
        RETURNING id, quantity
        "#,
    )
    .bind(user_id)
    .bind(sticker_id)
    .bind(now)
    .fetch_optional(executor)
    .await?;
    Ok(row.map(|(row_id, quantity)| GrantResult { row_id, quantity }))
}

/// Delete a row that reached zero
pub async fn delete_if_empty<'e, E>(executor: E, row_id: i64) -> RepoResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let done = sqlx::query("DELETE FROM inventory WHERE id = ? AND quantity = 0")
        .bind(row_id)
        .execute(executor)
        .await?;
    Ok(done.rows_affected() > 0)
}

/// Fill in a missing pack id; an existing one is never overwritten
pub async fn backfill_pack_id<'e, E>(executor: E, row_id: i64, pack_id: &str) -> RepoResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let done = sqlx::query("UPDATE inventory SET pack_id = ? WHERE id = ? AND pack_id IS NULL")
        .bind(pack_id)
        .bind(row_id)
        .execute(executor)
        .await?;
    Ok(done.rows_affected() > 0)
}
