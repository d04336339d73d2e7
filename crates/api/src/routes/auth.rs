use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use inmo_core::auth::{NewUserRequest, UserUpdateRequest};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::extract::{AdminUser, ApiJson, ApiPath, CurrentUser};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/change-password", post(change_password))
        .route("/auth/users", get(list_users).post(create_user))
        .route("/auth/users/:username", put(update_user).delete(delete_user))
        .route("/auth/unlock-user/:username", post(unlock_user))
        .route("/auth/reset-password-request", post(reset_password_request))
        .route("/auth/verify-token", post(verify_token))
}

#[derive(Debug, Default, Deserialize)]
struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let outcome = state
        .auth
        .login(
            req.username.as_deref().unwrap_or_default(),
            req.password.as_deref().unwrap_or_default(),
            Utc::now(),
        )
        .await?;
    Ok(Json(json!({
        "success": true,
        "token": outcome.token,
        "token_type": outcome.token_type,
        "expires_in": outcome.expires_in,
        "user": outcome.user,
    })))
}

/// Tokens are stateless; logging out only acknowledges a valid session.
async fn logout(CurrentUser(user): CurrentUser) -> Json<Value> {
    tracing::info!(username = %user.username, "logout");
    Json(json!({ "success": true, "message": "Logged out successfully" }))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<Value> {
    Json(json!({ "success": true, "user": user }))
}

#[derive(Debug, Default, Deserialize)]
struct ChangePasswordRequest {
    current_password: Option<String>,
    new_password: Option<String>,
}

async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<Value>> {
    state
        .auth
        .change_password(
            &user,
            req.current_password.as_deref().unwrap_or_default(),
            req.new_password.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(json!({ "success": true, "message": "Password changed successfully" })))
}

async fn list_users(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Json<Value>> {
    let users = state.auth.list_users().await?;
    Ok(Json(json!({ "success": true, "users": users })))
}

async fn create_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(req): ApiJson<NewUserRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let user = state.auth.create_user(req, Utc::now()).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "user": user,
            "message": "User created successfully",
        })),
    ))
}

async fn update_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(username): ApiPath<String>,
    ApiJson(req): ApiJson<UserUpdateRequest>,
) -> ApiResult<Json<Value>> {
    let user = state.auth.update_user(&username, req).await?;
    Ok(Json(json!({
        "success": true,
        "user": user,
        "message": "User updated successfully",
    })))
}

async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(username): ApiPath<String>,
) -> ApiResult<Json<Value>> {
    state.auth.delete_user(&admin, &username).await?;
    Ok(Json(json!({ "success": true, "message": "User deleted successfully" })))
}

async fn unlock_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(username): ApiPath<String>,
) -> ApiResult<Json<Value>> {
    let user = state.auth.unlock_user(&username).await?;
    Ok(Json(json!({
        "success": true,
        "user": user,
        "message": "User unlocked successfully",
    })))
}

#[derive(Debug, Default, Deserialize)]
struct ResetRequest {
    email: Option<String>,
}

async fn reset_password_request(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResetRequest>,
) -> ApiResult<Json<Value>> {
    if let Some(email) = req.email.as_deref().filter(|e| !e.trim().is_empty()) {
        state.auth.request_password_reset(email, Utc::now()).await?;
    }
    Ok(Json(json!({
        "success": true,
        "message": "If the email exists, a password reset link has been sent",
    })))
}

async fn verify_token(CurrentUser(user): CurrentUser) -> Json<Value> {
    Json(json!({
        "success": true,
        "valid": true,
        "user": {
            "id": user.id,
            "username": user.username,
            "role": user.role,
            "full_name": user.full_name,
        },
    }))
}
