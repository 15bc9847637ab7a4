//! WebSocket message protocol definitions.
//!
//! All messages are JSON-encoded, tagged by `type` and use snake_case for
//! field names.

use serde::{Deserialize, Serialize};

use crate::presence::{PresenceEvent, PresenceOverride, PresenceState};
use crate::store::ChangeKind;

/// Messages sent from client to server.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Identify the user behind this connection.
    Auth {
        user_id: String,
        name: String,
        /// Required when the server has an auth secret
        #[serde(default)]
        token: Option<String>,
    },

    /// Pick an explicit presence.
    SetPresence { state: PresenceOverride },

    /// Keep-alive ping.
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to a successful `auth`.
    Authenticated {
        user_id: String,
        state: PresenceState,
    },

    /// Everyone currently connected; sent right after `authenticated`.
    PresenceSnapshot { users: Vec<PresenceEvent> },

    /// A user's displayed presence changed.
    Presence(PresenceEvent),

    /// A record in a watched collection was committed.
    RecordChanged {
        collection: String,
        kind: ChangeKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Response to ping.
    Pong,

    /// Error message.
    Error { message: String },
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}
