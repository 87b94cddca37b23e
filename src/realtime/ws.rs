use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::api::state::AppState;
use crate::chat::ChatService;
use crate::error::AppError;
use crate::realtime::events::{ClientEvent, ServerEvent};
use crate::realtime::hub::ConnectionId;

/// GET /ws — upgrade to the realtime channel. All client and server
/// events are JSON frames of the form `{"event": …, "data": …}`.
pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let hub = state.service.hub().clone();
    let connection_id = hub.connect(tx).await;
    tracing::debug!("Connection {} opened", connection_id);

    // Everything the hub pushes at this connection goes out through
    // one writer task.
    let push_task = tokio::spawn(push_events(
        sink,
        rx,
        state.config.heartbeat_interval(),
    ));

    let pong_timeout = state.config.pong_timeout();
    loop {
        // A connection whose transport sends nothing back within the
        // pong window is force-closed; the writer's protocol-level
        // Ping guarantees a live client produces at least a Pong per
        // heartbeat, even if it only ever listens.
        let frame = match tokio::time::timeout(pong_timeout, stream.next()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(_) => break,
            Err(_) => {
                tracing::debug!("Connection {} timed out", connection_id);
                break;
            }
        };

        match frame {
            WsMessage::Text(text) => {
                let event = match serde_json::from_str::<ClientEvent>(text.as_str()) {
                    Ok(event) => event,
                    Err(_) => {
                        hub.send_to(connection_id, ServerEvent::error("Malformed event"))
                            .await;
                        continue;
                    }
                };
                if let Err(err) = dispatch(&state.service, connection_id, event).await {
                    // Realtime-path failures go to the originating
                    // connection only
                    hub.send_to(connection_id, ServerEvent::error(err.to_string()))
                        .await;
                }
            }
            WsMessage::Close(_) => break,
            // Pings, pongs and binary frames just keep the connection
            // alive
            _ => {}
        }
    }

    hub.disconnect(connection_id).await;
    push_task.abort();
    tracing::debug!("Connection {} closed", connection_id);
}

/// Writer half of one connection: forwards hub events as Text frames
/// and emits a protocol-level Ping at the heartbeat interval. Clients
/// answer the Ping with a Pong automatically, so a subscriber that
/// only listens still produces inbound traffic and is not tripped by
/// the reader's pong timeout. The JSON `ping` event stays a separate,
/// application-level broadcast.
async fn push_events<S>(
    mut sink: S,
    mut rx: mpsc::UnboundedReceiver<ServerEvent>,
    heartbeat: Duration,
) where
    S: Sink<WsMessage> + Unpin,
{
    let mut ticker = tokio::time::interval(heartbeat);
    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else {
                    break;
                };
                let Ok(text) = serde_json::to_string(&event) else {
                    continue;
                };
                if sink.send(WsMessage::Text(text.into())).await.is_err() {
                    break;
                }
            }
            _ = ticker.tick() => {
                if sink.send(WsMessage::Ping(Default::default())).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn dispatch(
    service: &ChatService,
    connection_id: ConnectionId,
    event: ClientEvent,
) -> Result<(), AppError> {
    match event {
        ClientEvent::RegisterUser(user_id) => {
            if user_id.is_empty() {
                return Err(AppError::Validation("Missing user id".to_string()));
            }
            service.hub().register(connection_id, &user_id).await;
            tracing::info!("User {} connected", user_id);
            Ok(())
        }
        ClientEvent::JoinRoom(room_id) => {
            if room_id.is_empty() {
                return Err(AppError::Validation("Missing room id".to_string()));
            }
            service.hub().join_room(connection_id, &room_id).await
        }
        ClientEvent::GroupMessage {
            room_id,
            sender_id,
            message,
        } => {
            if room_id.is_empty() || sender_id.is_empty() {
                return Err(AppError::Validation("Missing required fields".to_string()));
            }
            service.send_message(&room_id, &sender_id, &message).await?;
            Ok(())
        }
    }
}
