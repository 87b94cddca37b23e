use std::collections::BTreeSet;

use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::chat::convo::direct_conversation_id;
use crate::db::models::{Conversation, ConversationKind};
use crate::db::now_millis;
use crate::error::AppError;

pub struct ConversationRepository;

impl ConversationRepository {
    pub async fn get(
        pool: &Pool<Sqlite>,
        id: &str,
    ) -> Result<Option<Conversation>, AppError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            "SELECT * FROM conversations WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(conversation)
    }

    /// Create a group room with members = `members` ∪ {creator}, one
    /// membership record per member, and an empty summary.
    ///
    /// All writes go through one transaction so readers of the
    /// membership index never observe a partially created room.
    pub async fn create_room(
        pool: &Pool<Sqlite>,
        name: &str,
        creator_id: &str,
        members: &[String],
    ) -> Result<String, AppError> {
        let id = Uuid::new_v4().to_string();
        let now = now_millis();

        let mut member_set: BTreeSet<&str> = members.iter().map(String::as_str).collect();
        member_set.insert(creator_id);

        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
INSERT INTO conversations (id, kind, name, created_by, created_at, updated_at)
VALUES (?, 'group', ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(name)
        .bind(creator_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for user_id in &member_set {
            sqlx::query(
                "INSERT INTO memberships (user_id, conversation_id, joined_at) VALUES (?, ?, ?)"
            )
            .bind(user_id)
            .bind(&id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT INTO conversation_summaries (conversation_id, updated_at) VALUES (?, ?)"
        )
        .bind(&id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(id)
    }

    /// Get or create the direct conversation between two users.
    ///
    /// The identifier is derived, so concurrent calls for the same
    /// pair converge on one row; every insert tolerates the row
    /// already existing.
    pub async fn ensure_direct(
        pool: &Pool<Sqlite>,
        user_a: &str,
        user_b: &str,
    ) -> Result<String, AppError> {
        let id = direct_conversation_id(user_a, user_b);

        if Self::get(pool, &id).await?.is_some() {
            return Ok(id);
        }

        let now = now_millis();
        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
INSERT INTO conversations (id, kind, name, created_by, created_at, updated_at)
VALUES (?, 'direct', NULL, NULL, ?, ?)
ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for user_id in [user_a, user_b] {
            sqlx::query(
                r#"
INSERT INTO memberships (user_id, conversation_id, joined_at)
VALUES (?, ?, ?)
ON CONFLICT(user_id, conversation_id) DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(&id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
INSERT INTO conversation_summaries (conversation_id, updated_at)
VALUES (?, ?)
ON CONFLICT(conversation_id) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(id)
    }

    pub async fn members(
        pool: &Pool<Sqlite>,
        conversation_id: &str,
    ) -> Result<Vec<String>, AppError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT user_id FROM memberships WHERE conversation_id = ? ORDER BY user_id"
        )
        .bind(conversation_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|(user_id,)| user_id).collect())
    }
}

impl ConversationKind {
    pub fn is_direct(self) -> bool {
        matches!(self, ConversationKind::Direct)
    }
}
