use sqlx::{Pool, Sqlite};

use crate::db::models::{ConversationSummary, Message};
use crate::db::now_millis;
use crate::error::AppError;

pub struct SummaryRepository;

impl SummaryRepository {
    /// Unconditionally overwrite the last-message projection and bump
    /// the conversation's activity timestamp.
    ///
    /// Last-writer-wins: when two appends race, the summary reflects
    /// whichever refresh reaches the store last. The reconciliation
    /// pass repairs any summary a failed refresh leaves stale.
    pub async fn refresh(pool: &Pool<Sqlite>, message: &Message) -> Result<(), AppError> {
        let now = now_millis();

        sqlx::query(
            r#"
INSERT INTO conversation_summaries (conversation_id, last_body, last_sender, last_timestamp, updated_at)
VALUES (?, ?, ?, ?, ?)
ON CONFLICT(conversation_id) DO UPDATE SET
    last_body = excluded.last_body,
    last_sender = excluded.last_sender,
    last_timestamp = excluded.last_timestamp,
    updated_at = excluded.updated_at
            "#,
        )
        .bind(&message.conversation_id)
        .bind(&message.content)
        .bind(&message.sender_id)
        .bind(message.created_at)
        .bind(now)
        .execute(pool)
        .await?;

        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(&message.conversation_id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn get(
        pool: &Pool<Sqlite>,
        conversation_id: &str,
    ) -> Result<Option<ConversationSummary>, AppError> {
        let summary = sqlx::query_as::<_, ConversationSummary>(
            "SELECT * FROM conversation_summaries WHERE conversation_id = ?"
        )
        .bind(conversation_id)
        .fetch_optional(pool)
        .await?;

        Ok(summary)
    }

    /// Recompute every conversation's summary from the newest log
    /// entry. The append/refresh sequence is not atomic, so a crashed
    /// or failed refresh can leave the projection behind the log;
    /// this pass closes that window.
    pub async fn reconcile(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
        let now = now_millis();

        let result = sqlx::query(
            r#"
INSERT INTO conversation_summaries (conversation_id, last_body, last_sender, last_timestamp, updated_at)
SELECT m.conversation_id, m.content, m.sender_id, m.created_at, ?
FROM messages m
WHERE m.rowid = (
    SELECT m2.rowid FROM messages m2
    WHERE m2.conversation_id = m.conversation_id
    ORDER BY m2.created_at DESC, m2.rowid DESC
    LIMIT 1
)
ON CONFLICT(conversation_id) DO UPDATE SET
    last_body = excluded.last_body,
    last_sender = excluded.last_sender,
    last_timestamp = excluded.last_timestamp,
    updated_at = excluded.updated_at
WHERE conversation_summaries.last_timestamp IS NULL
   OR conversation_summaries.last_timestamp < excluded.last_timestamp
   OR conversation_summaries.last_body IS NOT excluded.last_body
            "#,
        )
        .bind(now)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
