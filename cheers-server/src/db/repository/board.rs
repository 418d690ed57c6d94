//! Sticker Board Repository

use serde_json::Value;
use sqlx::{Executor, Sqlite};

use super::{RepoError, RepoResult};
use shared::models::Board;

#[derive(Debug, sqlx::FromRow)]
struct BoardRow {
    id: String,
    owner_id: String,
    name: String,
    description: String,
    stickers: String,
    version: i64,
    updated_at: i64,
}

impl TryFrom<BoardRow> for Board {
    type Error = RepoError;

    fn try_from(row: BoardRow) -> Result<Self, Self::Error> {
        Ok(Board {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            description: row.description,
            stickers: serde_json::from_str(&row.stickers)?,
            version: row.version,
            updated_at: row.updated_at,
        })
    }
}

/// Board write guarded by the version read earlier in the same unit of work
#[derive(Debug)]
pub struct BoardWrite<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub stickers: &'a [Value],
    pub expected_version: i64,
    pub now: i64,
}

pub async fn find_by_id<'e, E>(executor: E, id: &str) -> RepoResult<Option<Board>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<BoardRow> = sqlx::query_as(
        "SELECT id, owner_id, name, description, stickers, version, updated_at \
         FROM boards WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    row.map(Board::try_from).transpose()
}

/// Compare-and-set update; `false` means another writer got there first
pub async fn update_cas<'e, E>(executor: E, write: &BoardWrite<'_>) -> RepoResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let stickers = serde_json::to_string(write.stickers)?;
    let done = sqlx::query(
        r#"
        UPDATE boards
        SET name = ?1, description = ?2, stickers = ?3, version = version + 1, updated_at = ?4
        WHERE id = ?5 AND version = ?6
        "#,
    )
    .bind(write.name)
    .bind(write.description)
    .bind(stickers)
    .bind(write.now)
    .bind(write.id)
    .bind(write.expected_version)
    .execute(executor)
    .await?;
    Ok(done.rows_affected() > 0)
}
