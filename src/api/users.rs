use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::api::state::AppState;
use crate::db::models::User;
use crate::db::UserRepository;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertUserRequest {
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// GET /api/users/{user_id}
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<User>, AppError> {
    let user = UserRepository::get_by_id(&state.db, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No such user: {}", user_id)))?;

    Ok(Json(user))
}

/// PUT /api/users/{user_id} — create the profile or update its
/// mutable display attributes
pub async fn upsert_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<UpsertUserRequest>,
) -> Result<Json<User>, AppError> {
    if req.display_name.trim().is_empty() {
        return Err(AppError::Validation("Display name must not be empty".to_string()));
    }

    let user = UserRepository::upsert(
        &state.db,
        &user_id,
        req.display_name.trim(),
        req.avatar_url.as_deref(),
    )
    .await?;

    Ok(Json(user))
}
