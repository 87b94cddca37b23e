use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::db::models::ConversationListing;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDirectChatRequest {
    pub user_id: String,
    pub other_user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDirectChatResponse {
    pub chat_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendChatMessageRequest {
    pub sender_id: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendChatMessageResponse {
    pub message_id: String,
    pub timestamp: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListConversationsQuery {
    pub user_id: String,
}

/// POST /api/chats/direct — get-or-create the conversation for a pair
/// of users
pub async fn create_direct_chat(
    State(state): State<AppState>,
    Json(req): Json<CreateDirectChatRequest>,
) -> Result<Json<CreateDirectChatResponse>, AppError> {
    let chat_id = state
        .service
        .ensure_direct_chat(&req.user_id, &req.other_user_id)
        .await?;

    Ok(Json(CreateDirectChatResponse { chat_id }))
}

/// POST /api/chats/{chat_id}/messages
pub async fn send_chat_message(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Json(req): Json<SendChatMessageRequest>,
) -> Result<(StatusCode, Json<SendChatMessageResponse>), AppError> {
    let message = state
        .service
        .send_message(&chat_id, &req.sender_id, &req.text)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SendChatMessageResponse {
            message_id: message.id,
            timestamp: message.created_at,
        }),
    ))
}

/// POST /api/chats/{chat_id}/read — sent → read for everything the
/// other party sent
pub async fn mark_read(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Json(req): Json<MarkReadRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let updated = state.service.mark_read(&chat_id, &req.user_id).await?;

    Ok(Json(serde_json::json!({ "updated": updated })))
}

/// GET /api/conversations?userId= — sidebar listing, most recent
/// activity first
pub async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<ListConversationsQuery>,
) -> Result<Json<Vec<ConversationListing>>, AppError> {
    let listings = state.service.list_conversations_for(&query.user_id).await?;

    Ok(Json(listings))
}
