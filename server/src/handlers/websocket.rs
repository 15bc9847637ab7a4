//! WebSocket handler for presence and change notifications.
//!
//! Handles WebSocket connections, binds them to a user on `auth` and keeps
//! the presence registry in step with the connection lifecycle.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::auth::verify_token;
use crate::websocket::{ClientMessage, ServerMessage};
use crate::AppState;

/// Handle an established WebSocket connection.
///
/// This function:
/// 1. Registers the connection with the manager
/// 2. Spawns a task to forward outgoing messages
/// 3. Processes incoming messages in a loop
/// 4. Detaches the connection from presence on disconnect
pub async fn handle_websocket_connection(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let conn_id = state.connections.register(tx);

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                        tracing::warn!("Failed to send WebSocket message: {}", e);
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize WebSocket message: {}", e);
                }
            }
        }
    });

    let mut session = Session::default();

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                for response in process_message(&text, &state, &conn_id, &mut session) {
                    state.connections.send_to(&conn_id, response);
                }
            }
            Ok(Message::Binary(_)) => {
                tracing::warn!("Binary messages not supported");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                tracing::info!(conn_id = %conn_id, "WebSocket close frame received");
                break;
            }
            Err(e) => {
                tracing::warn!(conn_id = %conn_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    state.connections.unregister(&conn_id);
    if let Some(user_id) = session.user_id {
        let remaining = state.presence.detach(&user_id, &conn_id);
        tracing::debug!(user_id = %user_id, remaining, "Presence detached");
    }
    send_task.abort();

    tracing::info!(
        conn_id = %conn_id,
        active_connections = state.connections.connection_count(),
        "WebSocket client disconnected"
    );
}

/// Per-connection state.
#[derive(Debug, Default)]
struct Session {
    user_id: Option<String>,
}

/// Process a client message and return the replies for this connection.
fn process_message(
    text: &str,
    state: &AppState,
    conn_id: &str,
    session: &mut Session,
) -> Vec<ServerMessage> {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            return vec![ServerMessage::error(format!("Invalid message format: {}", e))];
        }
    };

    match client_msg {
        ClientMessage::Auth {
            user_id,
            name,
            token,
        } => {
            if let Some(current) = &session.user_id {
                return vec![ServerMessage::error(format!(
                    "Connection already authenticated as {}",
                    current
                ))];
            }
            if user_id.trim().is_empty() {
                return vec![ServerMessage::error("user_id must not be empty")];
            }
            if !verify_token(&state.config, token.as_deref()) {
                tracing::warn!(conn_id = %conn_id, user_id = %user_id, "WebSocket auth rejected");
                return vec![ServerMessage::error("Invalid token")];
            }

            state.connections.set_user(conn_id, &user_id);
            let presence = state.presence.attach(&user_id, &name, conn_id);
            session.user_id = Some(user_id.clone());

            vec![
                ServerMessage::Authenticated {
                    user_id,
                    state: presence,
                },
                ServerMessage::PresenceSnapshot {
                    users: state.presence.snapshot(),
                },
            ]
        }

        ClientMessage::SetPresence { state: choice } => match &session.user_id {
            Some(user_id) => {
                state.presence.set_override(user_id, choice);
                Vec::new()
            }
            None => vec![ServerMessage::error("Not authenticated")],
        },

        ClientMessage::Ping => vec![ServerMessage::Pong],
    }
}
