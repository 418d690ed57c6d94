//! Catalog read model (sticker → pack)

use sqlx::{Executor, Sqlite};

use super::RepoResult;

/// Resolve the pack a catalog sticker belongs to
pub async fn find_pack_id<'e, E>(executor: E, sticker_id: &str) -> RepoResult<Option<String>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT pack_id FROM catalog_stickers WHERE id = ?")
        .bind(sticker_id)
        .fetch_optional(executor)
        .await?;
    Ok(row.map(|(pack_id,)| pack_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;

    #[tokio::test]
    async fn test_find_pack_id() {
        let db = DbService::in_memory().await.unwrap();
        sqlx::query("INSERT INTO catalog_stickers (id, pack_id, name) VALUES (?, ?, ?)")
            .bind("65a1b2c3d4e5f6a7b8c9d0e1")
            .bind("pack-1")
            .bind("Syringe Hero")
            .execute(&db.pool)
            .await
            .unwrap();

        assert_eq!(
            find_pack_id(&db.pool, "65a1b2c3d4e5f6a7b8c9d0e1").await.unwrap().as_deref(),
            Some("pack-1")
        );
        assert_eq!(find_pack_id(&db.pool, "000000000000000000000000").await.unwrap(), None);
    }
}
