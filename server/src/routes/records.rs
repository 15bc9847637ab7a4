//! Record and settings endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use roster_engine::{Fields, Record};
use serde::Serialize;
use serde_json::Value;

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::object_body;
use crate::AppState;

/// Response for DELETE.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// Create record routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/api/{collection}", get(list_records).post(create_record))
        .route(
            "/api/{collection}/{id}",
            get(get_record).put(update_record).delete(delete_record),
        )
}

/// GET /api/settings
async fn get_settings(State(state): State<AppState>, _auth: AuthUser) -> Result<Json<Fields>> {
    Ok(Json(state.store.settings().await?))
}

/// PUT /api/settings - Merge the body into the settings.
async fn put_settings(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(body): Json<Value>,
) -> Result<Json<Fields>> {
    let patch = object_body(body)?;
    Ok(Json(state.store.set_settings(patch).await?))
}

/// GET /api/{collection}
async fn list_records(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(collection): Path<String>,
) -> Result<Json<Vec<Record>>> {
    Ok(Json(state.store.list(&collection).await?))
}

/// POST /api/{collection}
async fn create_record(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Record>)> {
    let fields = object_body(body)?;
    let record = state.store.insert(&collection, fields).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/{collection}/{id}
async fn get_record(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Record>> {
    Ok(Json(state.store.get(&collection, &id).await?))
}

/// PUT /api/{collection}/{id} - Merge-patch, creating the record if absent.
async fn update_record(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Record>> {
    let patch = object_body(body)?;
    Ok(Json(state.store.update(&collection, &id, patch).await?))
}

/// DELETE /api/{collection}/{id}
async fn delete_record(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>> {
    let deleted = state.store.delete(&collection, &id).await?;
    Ok(Json(DeleteResponse { deleted }))
}
