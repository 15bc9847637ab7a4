//! WebSocket connection manager.
//!
//! Tracks active WebSocket connections and provides broadcast capabilities
//! for pushing presence and record changes to connected clients.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use super::ServerMessage;
use crate::store::{CommitEvent, CommitHook, HookError};

/// Sender for WebSocket messages.
pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

/// A single WebSocket connection.
#[derive(Debug)]
pub struct Connection {
    /// User bound by `auth`, if any
    pub user_id: Option<String>,
    /// Channel to send messages to this connection
    pub sender: MessageSender,
}

/// Manages active WebSocket connections.
///
/// Thread-safe and can be shared across handlers via `Arc`.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    /// All active connections, keyed by connection ID.
    connections: DashMap<String, Connection>,
}

impl ConnectionManager {
    /// Create a new connection manager.
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Create a new connection manager wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a new, not yet authenticated connection.
    ///
    /// Returns the connection ID.
    pub fn register(&self, sender: MessageSender) -> String {
        let conn_id = uuid::Uuid::new_v4().to_string();

        self.connections.insert(
            conn_id.clone(),
            Connection {
                user_id: None,
                sender,
            },
        );

        tracing::info!(conn_id = %conn_id, "WebSocket connection registered");

        conn_id
    }

    /// Bind a user to a connection. `false` when the connection is gone.
    pub fn set_user(&self, conn_id: &str, user_id: &str) -> bool {
        match self.connections.get_mut(conn_id) {
            Some(mut conn) => {
                conn.user_id = Some(user_id.to_string());
                true
            }
            None => false,
        }
    }

    /// Unregister a connection, returning the user it was bound to.
    pub fn unregister(&self, conn_id: &str) -> Option<String> {
        let (_, conn) = self.connections.remove(conn_id)?;
        tracing::info!(
            conn_id = %conn_id,
            user_id = ?conn.user_id,
            "WebSocket connection unregistered"
        );
        conn.user_id
    }

    /// Broadcast a message to all connections.
    ///
    /// Returns the number of connections that received the message.
    pub fn broadcast_all(&self, message: ServerMessage) -> usize {
        let mut sent_count = 0;

        for entry in self.connections.iter() {
            if entry.value().sender.send(message.clone()).is_ok() {
                sent_count += 1;
            }
        }

        sent_count
    }

    /// Send a message to a specific connection.
    pub fn send_to(&self, conn_id: &str, message: ServerMessage) -> bool {
        if let Some(conn) = self.connections.get(conn_id) {
            conn.sender.send(message).is_ok()
        } else {
            false
        }
    }

    /// Get the number of active connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl CommitHook for ConnectionManager {
    fn on_commit(&self, event: &CommitEvent) -> Result<(), HookError> {
        let sent = self.broadcast_all(ServerMessage::RecordChanged {
            collection: event.collection.clone(),
            kind: event.kind,
            id: event.id.clone(),
        });
        tracing::debug!(
            collection = %event.collection,
            recipients = sent,
            "Record change broadcast"
        );
        Ok(())
    }
}
