//! Legacy cheers credits
//!
//! Each user document carries a JSON array of small integer sticker ids.

use sqlx::{Executor, Sqlite};

use super::RepoResult;

/// Atomically remove one occurrence of `sticker_id` from the user's credits
///
/// Returns `false` when the credit was not present; nothing is written then.
pub async fn remove_if_present<'e, E>(executor: E, user_id: &str, sticker_id: i64) -> RepoResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let done = sqlx::query(
        r#"
        UPDATE users
        SET cheers = json_remove(
            cheers,
            (SELECT '$[' || je.key || ']'
             FROM json_each(users.cheers) je
             WHERE je.value = ?2
             LIMIT 1)
        )
        WHERE id = ?1
          AND EXISTS (SELECT 1 FROM json_each(users.cheers) WHERE value = ?2)
        "#,
    )
    .bind(user_id)
    .bind(sticker_id)
    .execute(executor)
    .await?;
    Ok(done.rows_affected() > 0)
}

/// Current credits of a user, `None` if the user is unknown
pub async fn find_credits<'e, E>(executor: E, user_id: &str) -> RepoResult<Option<Vec<i64>>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT cheers FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(executor)
        .await?;
    row.map(|(raw,)| serde_json::from_str(&raw))
        .transpose()
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;

    async fn seed(pool: &sqlx::SqlitePool, user_id: &str, cheers: &str) {
        sqlx::query("INSERT INTO users (id, cheers) VALUES (?, ?)")
            .bind(user_id)
            .bind(cheers)
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_remove_single_occurrence() {
        let db = DbService::in_memory().await.unwrap();
        seed(&db.pool, "u1", "[1,2,3,2]").await;

        assert!(remove_if_present(&db.pool, "u1", 2).await.unwrap());
        assert_eq!(find_credits(&db.pool, "u1").await.unwrap(), Some(vec![1, 3, 2]));
    }

    #[tokio::test]
    async fn test_absent_credit_is_untouched() {
        let db = DbService::in_memory().await.unwrap();
        seed(&db.pool, "u1", "[1,3]").await;

        assert!(!remove_if_present(&db.pool, "u1", 2).await.unwrap());
        assert!(!remove_if_present(&db.pool, "nobody", 1).await.unwrap());
        assert_eq!(find_credits(&db.pool, "u1").await.unwrap(), Some(vec![1, 3]));
        assert_eq!(find_credits(&db.pool, "nobody").await.unwrap(), None);
    }
}
