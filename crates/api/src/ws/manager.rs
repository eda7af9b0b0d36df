use std::collections::{HashMap, HashSet};

use axum::body::Bytes;
use axum::extract::ws::Message;
use storyforge_core::collaboration::CollabMessage;
use storyforge_core::types::{DbId, Timestamp};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    /// Authenticated user. Connections are only accepted with a valid token.
    pub user_id: DbId,
    pub sender: WsSender,
    pub connected_at: Timestamp,
    /// Projects this connection has joined.
    pub rooms: HashSet<DbId>,
}

/// Manages all active WebSocket connections and their project rooms.
///
/// Thread-safe via interior `RwLock`; wrapped in `Arc` and shared across
/// the application.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(&self, conn_id: String, user_id: DbId) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            user_id,
            sender: tx,
            connected_at: chrono::Utc::now(),
            rooms: HashSet::new(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Remove a connection. Returns the rooms it had joined.
    pub async fn remove(&self, conn_id: &str) -> Vec<DbId> {
        self.connections
            .write()
            .await
            .remove(conn_id)
            .map(|conn| conn.rooms.into_iter().collect())
            .unwrap_or_default()
    }

    /// Put a connection into a project room. Returns `false` for unknown
    /// connections.
    pub async fn join_room(&self, conn_id: &str, project_id: DbId) -> bool {
        match self.connections.write().await.get_mut(conn_id) {
            Some(conn) => {
                conn.rooms.insert(project_id);
                true
            }
            None => false,
        }
    }

    /// Take a connection out of a project room. Returns `true` if it was in it.
    pub async fn leave_room(&self, conn_id: &str, project_id: DbId) -> bool {
        self.connections
            .write()
            .await
            .get_mut(conn_id)
            .is_some_and(|conn| conn.rooms.remove(&project_id))
    }

    pub async fn in_room(&self, conn_id: &str, project_id: DbId) -> bool {
        self.connections
            .read()
            .await
            .get(conn_id)
            .is_some_and(|conn| conn.rooms.contains(&project_id))
    }

    /// Rooms a connection has joined.
    pub async fn rooms_of(&self, conn_id: &str) -> Vec<DbId> {
        self.connections
            .read()
            .await
            .get(conn_id)
            .map(|conn| conn.rooms.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether any of the user's connections is still in the room.
    pub async fn user_in_room(&self, user_id: DbId, project_id: DbId) -> bool {
        self.connections
            .read()
            .await
            .values()
            .any(|conn| conn.user_id == user_id && conn.rooms.contains(&project_id))
    }

    /// Find all connection IDs associated with a given user.
    pub async fn get_by_user(&self, user_id: DbId) -> Vec<String> {
        self.connections
            .read()
            .await
            .iter()
            .filter(|(_, conn)| conn.user_id == user_id)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Broadcast a message to all connected clients.
    ///
    /// Connections whose send channels are closed are skipped; they are
    /// cleaned up when their receive loop ends.
    pub async fn broadcast(&self, message: Message) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(message.clone());
        }
    }

    /// Send a message to every connection in a project room, optionally
    /// skipping the originating connection.
    ///
    /// Returns the number of connections the message was sent to.
    pub async fn broadcast_to_project(
        &self,
        project_id: DbId,
        message: Message,
        except: Option<&str>,
    ) -> usize {
        let conns = self.connections.read().await;
        let mut count = 0;
        for (id, conn) in conns.iter() {
            if conn.rooms.contains(&project_id) && except != Some(id.as_str()) {
                let _ = conn.sender.send(message.clone());
                count += 1;
            }
        }
        count
    }

    /// Send a message to all connections belonging to a specific user.
    ///
    /// Returns the number of connections the message was sent to.
    pub async fn send_to_user(&self, user_id: DbId, message: Message) -> usize {
        let conns = self.connections.read().await;
        let mut count = 0;
        for conn in conns.values() {
            if conn.user_id == user_id {
                let _ = conn.sender.send(message.clone());
                count += 1;
            }
        }
        count
    }

    /// Send a message to one connection.
    pub async fn send_to(&self, conn_id: &str, message: Message) -> bool {
        self.connections
            .read()
            .await
            .get(conn_id)
            .is_some_and(|conn| conn.sender.send(message).is_ok())
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a protocol message as a text frame.
pub fn collab_frame(message: &CollabMessage) -> Message {
    match serde_json::to_string(message) {
        Ok(text) => Message::Text(text.into()),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode WebSocket message");
            Message::Text(r#"{"type":"error","message":"internal error"}"#.into())
        }
    }
}
