use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::state::AppState;
use crate::db::models::Message;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct GetMessagesQuery {
    /// Cursor: return messages with timestamp >= since (unix millis).
    pub since: Option<i64>,
}

/// GET /api/messages/{room_id} — full ordered history, or the tail
/// from the `since` cursor
pub async fn get_messages(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<GetMessagesQuery>,
) -> Result<Json<Vec<Message>>, AppError> {
    let messages = state.service.list_messages(&room_id, query.since).await?;

    Ok(Json(messages))
}
