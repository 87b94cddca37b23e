use serde::{Deserialize, Serialize};

use crate::db::models::Message;

/// Events a client may send over the socket. The event names
/// (`registerUser`, `joinRoom`, `groupMessage`) are the wire contract
/// and must not change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Announce identity; moves the connection into the presence map.
    RegisterUser(String),
    /// Subscribe the connection to a conversation's channel.
    JoinRoom(String),
    /// Send a message into a room.
    #[serde(rename_all = "camelCase")]
    GroupMessage {
        room_id: String,
        sender_id: String,
        message: String,
    },
}

/// Events pushed to clients: `newGroupMessage`, `error`, `ping`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    NewGroupMessage {
        id: String,
        sender_id: String,
        content: String,
        timestamp: String,
    },
    Error {
        message: String,
    },
    Ping(String),
}

impl ServerEvent {
    pub fn new_group_message(message: &Message) -> Self {
        ServerEvent::NewGroupMessage {
            id: message.id.clone(),
            sender_id: message.sender_id.clone(),
            content: message.content.clone(),
            timestamp: rfc3339(message.created_at),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    pub fn ping_now() -> Self {
        ServerEvent::Ping(chrono::Utc::now().to_rfc3339())
    }
}

fn rfc3339(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}
