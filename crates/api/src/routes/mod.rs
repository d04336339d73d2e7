mod auth;
mod clients;
mod projects;
mod reports;
mod site;
mod valuations;

use axum::{http::StatusCode, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

/// Everything served under `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(site::router())
        .merge(valuations::router())
        .merge(clients::router())
        .merge(projects::router())
        .merge(reports::router())
        .merge(auth::router())
        .fallback(not_found)
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "error": "Endpoint not found" })),
    )
}
