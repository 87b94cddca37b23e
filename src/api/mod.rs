pub mod chats;
pub mod messages;
pub mod rooms;
pub mod state;
pub mod users;

pub use state::AppState;

use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::realtime::ws;

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

pub fn create_router(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        // Health check
        .route("/api/health", get(health))
        // Realtime channel
        .route("/ws", get(ws::ws_handler))
        // Group room lifecycle
        .route("/api/rooms/group", post(rooms::create_group_room))
        .route("/api/rooms/{room_id}/join", post(rooms::join_room))
        // Message log
        .route("/api/messages/{room_id}", get(messages::get_messages))
        // Direct chats
        .route("/api/chats/direct", post(chats::create_direct_chat))
        .route("/api/chats/{chat_id}/messages", post(chats::send_chat_message))
        .route("/api/chats/{chat_id}/read", post(chats::mark_read))
        // Sidebar listing
        .route("/api/conversations", get(chats::list_conversations))
        // Profiles
        .route(
            "/api/users/{user_id}",
            get(users::get_user).put(users::upsert_user),
        )
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
