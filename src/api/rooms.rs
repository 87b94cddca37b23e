use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRoomRequest {
    pub name: String,
    pub creator_id: String,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRoomResponse {
    pub room_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub user_id: String,
}

/// POST /api/rooms/group
pub async fn create_group_room(
    State(state): State<AppState>,
    Json(req): Json<CreateGroupRoomRequest>,
) -> Result<(StatusCode, Json<CreateGroupRoomResponse>), AppError> {
    let room_id = state
        .service
        .create_room(&req.name, &req.creator_id, &req.members)
        .await?;

    Ok((StatusCode::CREATED, Json(CreateGroupRoomResponse { room_id })))
}

/// POST /api/rooms/{room_id}/join — idempotent for existing members
pub async fn join_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(req): Json<JoinRoomRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if req.user_id.is_empty() {
        return Err(AppError::Validation("Missing user id".to_string()));
    }

    state.service.join_room(&room_id, &req.user_id).await?;

    Ok(Json(serde_json::json!({ "roomId": room_id })))
}
