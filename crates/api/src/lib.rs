pub mod error;
pub mod extract;
pub mod routes;

use axum::{http::HeaderValue, Router};
use inmo_core::auth::AuthService;
use inmo_core::config::Settings;
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    /// `None` when the service started without a reachable database.
    pub pool: Option<PgPool>,
    pub auth: Arc<AuthService>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn db(&self) -> ApiResult<&PgPool> {
        self.pool.as_ref().ok_or(ApiError::Unavailable)
    }

    pub fn reports_dir(&self) -> PathBuf {
        PathBuf::from(&self.settings.reports_dir)
    }
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if settings.allows_any_origin() {
        return layer.allow_origin(Any);
    }
    let origins = settings
        .cors_allow_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect::<Vec<_>>();
    layer.allow_origin(origins)
}

/// `/api/*` routes plus the single-page app: unknown non-API paths serve `index.html`.
pub fn app_router(state: AppState) -> Router {
    let static_dir = Path::new(&state.settings.static_dir);
    let spa = ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));
    let cors = cors_layer(&state.settings);

    Router::new()
        .nest("/api", routes::router())
        .fallback_service(spa)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
