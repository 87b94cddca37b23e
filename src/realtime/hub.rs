use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::AppError;
use crate::realtime::events::ServerEvent;

pub type ConnectionId = Uuid;

struct ConnectionEntry {
    user_id: Option<String>,
    rooms: HashSet<String>,
    tx: UnboundedSender<ServerEvent>,
}

#[derive(Default)]
struct HubInner {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    // userId -> connectionId, rebuilt from registration events only
    presence: HashMap<String, ConnectionId>,
    rooms: HashMap<String, HashSet<ConnectionId>>,
}

/// In-process fan-out state: presence map, per-connection subscription
/// sets, and per-room connection sets, all updated atomically per
/// event under one lock.
///
/// Nothing here is durable. A restart loses presence and
/// subscriptions; clients re-register and rejoin on reconnect and
/// recover missed messages by re-reading the log.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<Mutex<HubInner>>,
    max_rooms_per_connection: usize,
}

impl Hub {
    pub fn new(max_rooms_per_connection: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner::default())),
            max_rooms_per_connection,
        }
    }

    /// Attach a new connection. Events pushed to this connection are
    /// delivered through `tx`; delivery is best-effort and at most
    /// once, send failures are ignored.
    pub async fn connect(&self, tx: UnboundedSender<ServerEvent>) -> ConnectionId {
        let id = Uuid::new_v4();
        let mut inner = self.inner.lock().await;
        inner.connections.insert(
            id,
            ConnectionEntry {
                user_id: None,
                rooms: HashSet::new(),
                tx,
            },
        );
        id
    }

    /// Announce a connection's identity. A later registration for the
    /// same user replaces the earlier mapping.
    pub async fn register(&self, connection_id: ConnectionId, user_id: &str) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let Some(entry) = inner.connections.get_mut(&connection_id) else {
            return;
        };

        let previous = entry.user_id.replace(user_id.to_string());
        if let Some(previous) = previous {
            if inner.presence.get(&previous) == Some(&connection_id) {
                inner.presence.remove(&previous);
            }
        }
        inner.presence.insert(user_id.to_string(), connection_id);
    }

    /// Subscribe a connection to a room channel. Idempotent; fails
    /// once the per-connection room cap is reached.
    pub async fn join_room(
        &self,
        connection_id: ConnectionId,
        room_id: &str,
    ) -> Result<(), AppError> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let Some(entry) = inner.connections.get_mut(&connection_id) else {
            return Ok(());
        };

        if entry.rooms.contains(room_id) {
            return Ok(());
        }
        if entry.rooms.len() >= self.max_rooms_per_connection {
            return Err(AppError::Validation(format!(
                "Room subscription limit of {} reached",
                self.max_rooms_per_connection
            )));
        }

        entry.rooms.insert(room_id.to_string());
        inner
            .rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(connection_id);
        Ok(())
    }

    /// Remove a connection from the presence map and every room set.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let mut inner = self.inner.lock().await;
        let Some(entry) = inner.connections.remove(&connection_id) else {
            return;
        };

        if let Some(user_id) = entry.user_id {
            if inner.presence.get(&user_id) == Some(&connection_id) {
                inner.presence.remove(&user_id);
            }
        }
        for room_id in entry.rooms {
            if let Some(members) = inner.rooms.get_mut(&room_id) {
                members.remove(&connection_id);
                if members.is_empty() {
                    inner.rooms.remove(&room_id);
                }
            }
        }
    }

    /// Push an event to every connection subscribed to a room.
    pub async fn broadcast(&self, room_id: &str, event: ServerEvent) {
        let targets: Vec<UnboundedSender<ServerEvent>> = {
            let inner = self.inner.lock().await;
            let Some(members) = inner.rooms.get(room_id) else {
                return;
            };
            members
                .iter()
                .filter_map(|id| inner.connections.get(id))
                .map(|entry| entry.tx.clone())
                .collect()
        };

        for tx in targets {
            let _ = tx.send(event.clone());
        }
    }

    /// Push an event to every connection, subscribed or not. Used by
    /// the heartbeat.
    pub async fn broadcast_all(&self, event: ServerEvent) {
        let targets: Vec<UnboundedSender<ServerEvent>> = {
            let inner = self.inner.lock().await;
            inner
                .connections
                .values()
                .map(|entry| entry.tx.clone())
                .collect()
        };

        for tx in targets {
            let _ = tx.send(event.clone());
        }
    }

    /// Push an event to one connection only.
    pub async fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) {
        let inner = self.inner.lock().await;
        if let Some(entry) = inner.connections.get(&connection_id) {
            let _ = entry.tx.send(event);
        }
    }

    pub async fn online(&self, user_id: &str) -> Option<ConnectionId> {
        let inner = self.inner.lock().await;
        inner.presence.get(user_id).copied()
    }

    pub async fn connection_count(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.connections.len()
    }

    /// Open a programmatic subscription to a room channel (the
    /// listener analog for non-socket consumers).
    pub async fn subscribe(&self, room_id: &str) -> Result<Subscription, AppError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = self.connect(tx).await;
        self.join_room(connection_id, room_id).await?;
        Ok(Subscription {
            hub: self.clone(),
            connection_id,
            rx,
        })
    }
}

/// Handle for one room subscription. Dropping the handle without
/// calling [`Subscription::cancel`] leaks the hub entry until the
/// process restarts, so teardown paths must cancel explicitly.
pub struct Subscription {
    hub: Hub,
    connection_id: ConnectionId,
    rx: UnboundedReceiver<ServerEvent>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ServerEvent> {
        self.rx.try_recv().ok()
    }

    /// Detach from the hub. No further events are delivered after
    /// this returns: the sender is unregistered under the hub lock
    /// and the receiving end is dropped here.
    pub async fn cancel(self) {
        self.hub.disconnect(self.connection_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test]
    async fn test_register_and_disconnect_updates_presence() {
        let hub = Hub::new(8);
        let (tx, _rx) = unbounded_channel();
        let conn = hub.connect(tx).await;

        hub.register(conn, "u1").await;
        assert_eq!(hub.online("u1").await, Some(conn));

        hub.disconnect(conn).await;
        assert_eq!(hub.online("u1").await, None);
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_reregistration_replaces_mapping() {
        let hub = Hub::new(8);
        let (tx1, _rx1) = unbounded_channel();
        let (tx2, _rx2) = unbounded_channel();
        let first = hub.connect(tx1).await;
        let second = hub.connect(tx2).await;

        hub.register(first, "u1").await;
        hub.register(second, "u1").await;
        assert_eq!(hub.online("u1").await, Some(second));

        // Disconnecting the stale connection must not clobber the
        // fresh mapping.
        hub.disconnect(first).await;
        assert_eq!(hub.online("u1").await, Some(second));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscribed_connections_once() {
        let hub = Hub::new(8);
        let (tx1, mut rx1) = unbounded_channel();
        let (tx2, mut rx2) = unbounded_channel();
        let joined = hub.connect(tx1).await;
        let other = hub.connect(tx2).await;

        hub.join_room(joined, "r1").await.unwrap();
        hub.join_room(joined, "r1").await.unwrap(); // idempotent
        hub.join_room(other, "r2").await.unwrap();

        hub.broadcast("r1", ServerEvent::error("x")).await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx1.try_recv().is_err(), "delivered more than once");
        assert!(rx2.try_recv().is_err(), "delivered to a non-member");
    }

    #[tokio::test]
    async fn test_room_cap_enforced() {
        let hub = Hub::new(2);
        let (tx, _rx) = unbounded_channel();
        let conn = hub.connect(tx).await;

        hub.join_room(conn, "a").await.unwrap();
        hub.join_room(conn, "b").await.unwrap();
        assert!(hub.join_room(conn, "c").await.is_err());
        // Rejoining an existing room is still fine at the cap.
        hub.join_room(conn, "a").await.unwrap();
    }

    #[tokio::test]
    async fn test_subscription_cancel_stops_delivery() {
        let hub = Hub::new(8);
        let mut sub = hub.subscribe("r1").await.unwrap();

        hub.broadcast("r1", ServerEvent::error("before")).await;
        assert!(sub.recv().await.is_some());

        sub.cancel().await;
        hub.broadcast("r1", ServerEvent::error("after")).await;
        assert_eq!(hub.connection_count().await, 0);
    }
}
