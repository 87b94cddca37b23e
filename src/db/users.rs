use sqlx::{Pool, Sqlite};

use crate::db::models::User;
use crate::db::now_millis;
use crate::error::AppError;

pub struct UserRepository;

impl UserRepository {
    /// Create the profile or update its display attributes. The
    /// identifier is immutable; display name and avatar are not.
    pub async fn upsert(
        pool: &Pool<Sqlite>,
        id: &str,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> Result<User, AppError> {
        let now = now_millis();

        sqlx::query(
            r#"
INSERT INTO users (id, display_name, avatar_url, created_at)
VALUES (?, ?, ?, ?)
ON CONFLICT(id) DO UPDATE SET
    display_name = excluded.display_name,
    avatar_url = excluded.avatar_url
            "#,
        )
        .bind(id)
        .bind(display_name)
        .bind(avatar_url)
        .bind(now)
        .execute(pool)
        .await?;

        let user = Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| AppError::Internal("Failed to fetch upserted user".to_string()))?;

        Ok(user)
    }

    pub async fn get_by_id(
        pool: &Pool<Sqlite>,
        id: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }
}
