use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use inmo_core::auth::AuthError;
use inmo_core::error::CoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{message}")]
    Locked {
        message: String,
        until: DateTime<Utc>,
    },
    #[error("database is not available")]
    Unavailable,
    #[error(transparent)]
    Internal(anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn not_found(entity: &str) -> Self {
        Self::NotFound(format!("{entity} not found"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Locked { .. } => StatusCode::LOCKED,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Validation { .. } => Self::BadRequest(e.to_string()),
            CoreError::NotFound { .. } => Self::NotFound(e.to_string()),
            CoreError::Computation(_) => Self::Internal(e.into()),
        }
    }
}

/// Store and renderer errors arrive as `anyhow`; validation failures raised inside them keep
/// their 4xx mapping.
impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast_ref::<CoreError>() {
            Some(core) if !matches!(core, CoreError::Computation(_)) => core.clone().into(),
            _ => Self::Internal(e),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingCredentials => Self::BadRequest(e.to_string()),
            AuthError::InvalidCredentials
            | AuthError::Inactive
            | AuthError::MissingToken
            | AuthError::TokenExpired
            | AuthError::InvalidToken => Self::Unauthorized(e.to_string()),
            AuthError::Locked { until } => Self::Locked {
                message: e.to_string(),
                until,
            },
            AuthError::Forbidden => Self::Forbidden(e.to_string()),
            AuthError::UserNotFound(_) => Self::NotFound(e.to_string()),
            AuthError::Conflict(msg) => Self::Conflict(msg),
            AuthError::Validation(core) => core.into(),
            AuthError::Internal(msg) => Self::Internal(anyhow::anyhow!(msg)),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Internal(e) => {
                sentry_anyhow::capture_anyhow(e);
                tracing::error!(error = %format!("{e:#}"), "request failed");
                json!({ "success": false, "error": "Internal server error" })
            }
            Self::Locked { message, until } => {
                json!({ "success": false, "error": message, "locked_until": until })
            }
            other => json!({ "success": false, "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn core_errors_survive_anyhow_wrapping() {
        let err: anyhow::Error = CoreError::validation("email", "already exists").into();
        let err = Err::<(), _>(err).context("insert clients failed").unwrap_err();
        let api: ApiError = err.into();
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
        assert!(api.to_string().contains("email"));
    }

    #[test]
    fn auth_errors_map_to_http() {
        let until = Utc::now();
        assert_eq!(
            ApiError::from(AuthError::Locked { until }).status(),
            StatusCode::LOCKED
        );
        assert_eq!(
            ApiError::from(AuthError::TokenExpired).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::Forbidden).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(AuthError::Validation(CoreError::missing("password"))).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn plain_anyhow_is_internal() {
        let api: ApiError = anyhow::anyhow!("db down").into();
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
