//! Who is connected right now.
//!
//! The [`PresenceRegistry`] reference-counts connections per user and
//! publishes a [`PresenceEvent`] whenever a user's displayed state changes.
//! [`spawn_presence_relay`] fans those events out to WebSocket clients and
//! records the last known state in the `presence` collection.

mod registry;
mod relay;

pub use registry::{PresenceEvent, PresenceOverride, PresenceRegistry, PresenceState};
pub use relay::spawn_presence_relay;
