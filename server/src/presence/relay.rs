//! Fans presence events out to sockets and the record store.

use super::{PresenceEvent, PresenceRegistry};
use crate::store::RecordStore;
use crate::websocket::{ConnectionManager, ServerMessage};
use roster_engine::Fields;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Collection holding the last known presence of each user.
pub const PRESENCE_COLLECTION: &str = "presence";

/// Forward every presence change to all sockets and persist it once.
///
/// Persistence is best-effort: a failed write is logged and dropped.
pub fn spawn_presence_relay(
    registry: &PresenceRegistry,
    store: Arc<RecordStore>,
    connections: Arc<ConnectionManager>,
) -> JoinHandle<()> {
    let mut events = registry.subscribe();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let sent = connections.broadcast_all(ServerMessage::Presence(event.clone()));
                    tracing::debug!(
                        user_id = %event.user_id,
                        state = ?event.state,
                        recipients = sent,
                        "Presence broadcast"
                    );
                    persist(&store, &event).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Presence relay lagged; events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn persist(store: &RecordStore, event: &PresenceEvent) {
    let patch: Fields = match json!({
        "name": event.name,
        "state": event.state,
        "lastSeen": event.last_seen,
    }) {
        serde_json::Value::Object(map) => map,
        _ => return,
    };

    if let Err(err) = store
        .update(PRESENCE_COLLECTION, &event.user_id, patch)
        .await
    {
        tracing::warn!(
            user_id = %event.user_id,
            error = %err,
            "Failed to persist presence"
        );
    }
}
