use sqlx::{Pool, Sqlite};

use crate::db::models::ConversationListing;
use crate::db::now_millis;
use crate::error::AppError;

pub struct MembershipRepository;

impl MembershipRepository {
    /// Idempotent: adding the same (user, conversation) pair twice
    /// leaves exactly one record.
    pub async fn add(
        pool: &Pool<Sqlite>,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
INSERT INTO memberships (user_id, conversation_id, joined_at)
VALUES (?, ?, ?)
ON CONFLICT(user_id, conversation_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(conversation_id)
        .bind(now_millis())
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn is_member(
        pool: &Pool<Sqlite>,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<bool, AppError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM memberships WHERE user_id = ? AND conversation_id = ?"
        )
        .bind(user_id)
        .bind(conversation_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.is_some())
    }

    /// All conversations visible to a user, joined with their
    /// last-message projection, most recently active first.
    pub async fn list_for_user(
        pool: &Pool<Sqlite>,
        user_id: &str,
    ) -> Result<Vec<ConversationListing>, AppError> {
        let listings = sqlx::query_as::<_, ConversationListing>(
            r#"
SELECT c.id, c.kind, c.name, c.created_by, c.updated_at,
       s.last_body, s.last_sender, s.last_timestamp
FROM memberships m
JOIN conversations c ON c.id = m.conversation_id
LEFT JOIN conversation_summaries s ON s.conversation_id = c.id
WHERE m.user_id = ?
ORDER BY COALESCE(s.last_timestamp, c.created_at) DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(listings)
    }

    pub async fn count_for_conversation(
        pool: &Pool<Sqlite>,
        conversation_id: &str,
    ) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM memberships WHERE conversation_id = ?"
        )
        .bind(conversation_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }
}
