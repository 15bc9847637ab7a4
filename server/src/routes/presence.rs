//! Live presence listing.
//!
//! Served under its own name; `/api/presence` belongs to the persisted
//! `presence` collection.

use axum::{extract::State, routing::get, Json, Router};

use crate::auth::AuthUser;
use crate::presence::PresenceEvent;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/live-presence", get(list_presence))
}

/// GET /api/live-presence - Every connected user with display state.
async fn list_presence(State(state): State<AppState>, _auth: AuthUser) -> Json<Vec<PresenceEvent>> {
    Json(state.presence.snapshot())
}
