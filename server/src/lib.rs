//! Roster Server - record store and presence service for a small CRM.
//!
//! Records live in PostgreSQL when it is reachable and in a local JSON file
//! when it is not; the [`storage::FailoverController`] switches between the
//! two without failing requests. Presence of connected users is tracked in
//! memory and pushed to WebSocket clients.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod presence;
pub mod routes;
pub mod storage;
pub mod store;
pub mod websocket;

use crate::config::Config;
use crate::presence::{spawn_presence_relay, PresenceRegistry};
use crate::storage::{Backend, BackoffPolicy, FailoverController, FileAdapter, RemoteAdapter};
use crate::store::RecordStore;
use crate::websocket::ConnectionManager;
use axum::Router;
use roster_engine::Schema;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Collections whose commits are pushed to WebSocket clients.
pub const WATCHED_COLLECTIONS: [&str; 2] = ["uploads", "messages"];

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecordStore>,
    pub presence: Arc<PresenceRegistry>,
    pub connections: Arc<ConnectionManager>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Open the backends, probe the remote and start the presence relay.
    pub async fn build(config: Config) -> Result<Self, roster_engine::Error> {
        let schema = Arc::new(Schema::crm());
        let file = FileAdapter::open(
            config.data_file.clone(),
            schema.clone(),
            config.write_queue_limit,
        )
        .await?;

        let remote: Option<Arc<dyn Backend>> = match &config.database_url {
            Some(url) if config.remote_enabled() => {
                Some(Arc::new(RemoteAdapter::connect_lazy(url, config.remote_timeout)?))
            }
            _ => None,
        };
        if config.database_url.is_none() {
            tracing::info!("DATABASE_URL not set; running on the file store only");
        }

        let controller = FailoverController::new(
            remote,
            Arc::new(file),
            BackoffPolicy::from_config(&config),
            config.force_file_store,
        );
        controller.probe().await;

        let connections = ConnectionManager::new_shared();
        let store = Arc::new(
            RecordStore::new(schema, controller).with_hook(&WATCHED_COLLECTIONS, connections.clone()),
        );

        let presence = Arc::new(PresenceRegistry::default());
        spawn_presence_relay(&presence, store.clone(), connections.clone());

        Ok(Self {
            store,
            presence,
            connections,
            config: Arc::new(config),
        })
    }
}

/// Build the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
