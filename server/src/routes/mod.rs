//! HTTP route definitions.

mod health;
mod presence;
mod records;
mod ws;

use crate::AppState;
use axum::Router;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(presence::routes())
        .merge(records::routes())
        .merge(ws::routes())
}
