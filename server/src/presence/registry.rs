//! In-memory presence registry.

use crate::storage::now_millis;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::{DashMap, DashSet};
use roster_engine::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::broadcast;

/// Displayed connectivity of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceState {
    Online,
    Away,
    Offline,
}

/// Explicit state a user can pick. `Online` clears a previous `Away`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceOverride {
    Away,
    Online,
}

/// A change in a user's displayed presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceEvent {
    pub user_id: String,
    pub name: String,
    pub state: PresenceState,
    /// Whether the user has any open connection
    pub connected: bool,
    pub last_seen: Timestamp,
}

#[derive(Debug)]
struct Entry {
    name: String,
    connections: HashSet<String>,
    last_seen: Timestamp,
}

/// Per-user connection sets plus the explicit away overrides.
///
/// Operations never fail. Connection changes publish their event while the
/// user's `entries` shard is still locked, so events for one user are sent
/// in the order the changes were applied. Lock order is `entries` then
/// `away`.
#[derive(Debug)]
pub struct PresenceRegistry {
    entries: DashMap<String, Entry>,
    away: DashSet<String>,
    events: broadcast::Sender<PresenceEvent>,
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new(256)
    }
}

impl PresenceRegistry {
    /// Create a registry whose subscribers may lag by up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            entries: DashMap::new(),
            away: DashSet::new(),
            events,
        }
    }

    /// Receive every future presence change.
    pub fn subscribe(&self) -> broadcast::Receiver<PresenceEvent> {
        self.events.subscribe()
    }

    /// Add `conn_id` to `user_id`'s connections. The user's first
    /// connection publishes an event.
    pub fn attach(&self, user_id: &str, name: &str, conn_id: &str) -> PresenceState {
        let now = now_millis();
        let mut entry = self
            .entries
            .entry(user_id.to_string())
            .or_insert_with(|| Entry {
                name: name.to_string(),
                connections: HashSet::new(),
                last_seen: now,
            });
        entry.name = name.to_string();
        entry.last_seen = now;
        let first = entry.connections.insert(conn_id.to_string()) && entry.connections.len() == 1;

        let state = self.display_state(user_id, true);
        if first {
            tracing::info!(user_id, conn_id, "User online");
            self.emit(PresenceEvent {
                user_id: user_id.to_string(),
                name: name.to_string(),
                state,
                connected: true,
                last_seen: now,
            });
        }
        state
    }

    /// Remove `conn_id` from `user_id`'s connections and return how many
    /// remain. Unknown users or connections are a no-op.
    pub fn detach(&self, user_id: &str, conn_id: &str) -> usize {
        let now = now_millis();
        let MapEntry::Occupied(mut occupied) = self.entries.entry(user_id.to_string()) else {
            return 0;
        };

        let entry = occupied.get_mut();
        if !entry.connections.remove(conn_id) {
            return entry.connections.len();
        }
        entry.last_seen = now;
        let remaining = entry.connections.len();
        if remaining > 0 {
            return remaining;
        }

        tracing::info!(user_id, conn_id, "User offline");
        self.emit(PresenceEvent {
            user_id: user_id.to_string(),
            name: entry.name.clone(),
            state: self.display_state(user_id, false),
            connected: false,
            last_seen: now,
        });
        occupied.remove();
        0
    }

    /// Set or clear the explicit away state. It survives disconnects and
    /// does not touch the connection count.
    pub fn set_override(&self, user_id: &str, choice: PresenceOverride) -> PresenceState {
        let changed = match choice {
            PresenceOverride::Away => self.away.insert(user_id.to_string()),
            PresenceOverride::Online => self.away.remove(user_id).is_some(),
        };

        let (name, connected, last_seen) = match self.entries.get(user_id) {
            Some(entry) => (entry.name.clone(), !entry.connections.is_empty(), entry.last_seen),
            None => (user_id.to_string(), false, now_millis()),
        };
        let state = self.display_state(user_id, connected);

        if changed {
            tracing::debug!(user_id, state = ?state, "Presence override changed");
            self.emit(PresenceEvent {
                user_id: user_id.to_string(),
                name,
                state,
                connected,
                last_seen,
            });
        }
        state
    }

    /// Displayed state of one user.
    pub fn state(&self, user_id: &str) -> PresenceState {
        self.display_state(user_id, self.connection_count(user_id) > 0)
    }

    /// Open connections of one user.
    pub fn connection_count(&self, user_id: &str) -> usize {
        self.entries
            .get(user_id)
            .map_or(0, |entry| entry.connections.len())
    }

    /// Every connected user, ordered by id.
    pub fn snapshot(&self) -> Vec<PresenceEvent> {
        let connected: Vec<(String, String, Timestamp)> = self
            .entries
            .iter()
            .filter(|entry| !entry.connections.is_empty())
            .map(|entry| (entry.key().clone(), entry.name.clone(), entry.last_seen))
            .collect();

        let mut users: Vec<PresenceEvent> = connected
            .into_iter()
            .map(|(user_id, name, last_seen)| PresenceEvent {
                state: self.display_state(&user_id, true),
                user_id,
                name,
                connected: true,
                last_seen,
            })
            .collect();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        users
    }

    fn display_state(&self, user_id: &str, connected: bool) -> PresenceState {
        if self.away.contains(user_id) {
            PresenceState::Away
        } else if connected {
            PresenceState::Online
        } else {
            PresenceState::Offline
        }
    }

    fn emit(&self, event: PresenceEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detach_of_unknown_user_is_noop() {
        let registry = PresenceRegistry::default();
        assert_eq!(registry.detach("ghost", "c1"), 0);
        assert_eq!(registry.state("ghost"), PresenceState::Offline);
    }

    #[test]
    fn duplicate_detach_never_goes_negative() {
        let registry = PresenceRegistry::default();
        registry.attach("u1", "Ann", "c1");
        registry.attach("u1", "Ann", "c2");

        assert_eq!(registry.detach("u1", "c1"), 1);
        assert_eq!(registry.detach("u1", "c1"), 1);
        assert_eq!(registry.detach("u1", "c2"), 0);
        assert_eq!(registry.detach("u1", "c2"), 0);
        assert_eq!(registry.connection_count("u1"), 0);
    }

    #[test]
    fn reattaching_same_connection_does_not_reannounce() {
        let registry = PresenceRegistry::default();
        let mut events = registry.subscribe();

        registry.attach("u1", "Ann", "c1");
        registry.attach("u1", "Ann", "c1");

        assert!(events.try_recv().is_ok());
        assert!(events.try_recv().is_err());
        assert_eq!(registry.connection_count("u1"), 1);
    }

    #[test]
    fn snapshot_lists_connected_users_in_order() {
        let registry = PresenceRegistry::default();
        registry.attach("u2", "Bea", "c1");
        registry.attach("u1", "Ann", "c2");
        registry.set_override("u2", PresenceOverride::Away);

        let snapshot = registry.snapshot();
        let states: Vec<_> = snapshot
            .iter()
            .map(|e| (e.user_id.as_str(), e.state))
            .collect();
        assert_eq!(
            states,
            vec![("u1", PresenceState::Online), ("u2", PresenceState::Away)]
        );
    }
}
