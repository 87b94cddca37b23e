use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::db::models::{Message, MessageStatus};
use crate::db::now_millis;
use crate::error::AppError;

pub struct MessageRepository;

impl MessageRepository {
    /// Append a message to a conversation's log.
    ///
    /// The timestamp is clamped against the newest entry so it never
    /// decreases within one conversation even if the wall clock does.
    /// Equal timestamps are ordered by insertion order (rowid) on the
    /// read side, never by wall-clock comparison.
    ///
    /// Membership and body validation are the caller's job; this is
    /// the raw log write.
    pub async fn append(
        pool: &Pool<Sqlite>,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<Message, AppError> {
        let id = Uuid::new_v4().to_string();
        let now = now_millis();

        let (newest,): (Option<i64>,) = sqlx::query_as(
            "SELECT MAX(created_at) FROM messages WHERE conversation_id = ?"
        )
        .bind(conversation_id)
        .fetch_one(pool)
        .await?;

        let created_at = newest.map_or(now, |t| now.max(t));

        sqlx::query(
            r#"
INSERT INTO messages (id, conversation_id, sender_id, content, status, created_at)
VALUES (?, ?, ?, ?, 'sent', ?)
            "#,
        )
        .bind(&id)
        .bind(conversation_id)
        .bind(sender_id)
        .bind(content)
        .bind(created_at)
        .execute(pool)
        .await?;

        Ok(Message {
            id,
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            content: content.to_string(),
            status: MessageStatus::Sent,
            created_at,
        })
    }

    /// Forward-ordered history; `since` selects `created_at >= cursor`,
    /// omitted cursor returns the full log.
    pub async fn list(
        pool: &Pool<Sqlite>,
        conversation_id: &str,
        since: Option<i64>,
    ) -> Result<Vec<Message>, AppError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
SELECT id, conversation_id, sender_id, content, status, created_at
FROM messages
WHERE conversation_id = ? AND created_at >= ?
ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(conversation_id)
        .bind(since.unwrap_or(i64::MIN))
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    /// Transition every message another party sent to `read`.
    /// Returns the number of rows updated.
    pub async fn mark_read(
        pool: &Pool<Sqlite>,
        conversation_id: &str,
        reader_id: &str,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
UPDATE messages SET status = 'read'
WHERE conversation_id = ? AND sender_id != ? AND status = 'sent'
            "#,
        )
        .bind(conversation_id)
        .bind(reader_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn count(
        pool: &Pool<Sqlite>,
        conversation_id: &str,
    ) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = ?"
        )
        .bind(conversation_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }
}
