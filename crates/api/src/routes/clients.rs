use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use inmo_core::domain::contract::{
    ClientContactRequest, ClientDocumentRequest, ClientPayload, KycApprovalRequest,
};
use inmo_core::storage::{self, clients};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::AppState;

const DEFAULT_LIST_LIMIT: i64 = 100;
const DEFAULT_TOP_LIMIT: i64 = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/clients", get(list_clients).post(create_client))
        .route("/clients/top-investors", get(top_investors))
        .route("/clients/top-roi", get(top_roi))
        .route("/clients/stats", get(stats))
        .route(
            "/clients/:id",
            get(get_client).put(update_client).delete(delete_client),
        )
        .route("/clients/:id/contacts", get(list_contacts).post(add_contact))
        .route(
            "/clients/:id/documents",
            get(list_documents).post(add_document),
        )
        .route("/clients/:id/portfolio", get(portfolio))
        .route("/clients/:id/kyc-approve", post(approve_kyc))
}

#[derive(Debug, Default, Deserialize)]
struct ClientListQuery {
    status: Option<String>,
    client_type: Option<String>,
    kyc_status: Option<String>,
    search: Option<String>,
    limit: Option<i64>,
}

async fn list_clients(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(q): ApiQuery<ClientListQuery>,
) -> ApiResult<Json<Value>> {
    let filter = clients::ClientFilter {
        status: q.status,
        client_type: q.client_type,
        kyc_status: q.kyc_status,
        search: q.search,
        limit: Some(storage::clamp_limit(q.limit, DEFAULT_LIST_LIMIT)),
    };
    let rows = clients::list_clients(state.db()?, &filter).await?;
    let views: Vec<_> = rows.iter().map(|c| c.view(false)).collect();
    Ok(Json(json!({
        "success": true,
        "total": views.len(),
        "clients": views,
    })))
}

async fn create_client(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(payload): ApiJson<ClientPayload>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let profile = payload.validate_and_into_profile()?;
    let client = clients::create_client(state.db()?, &profile).await?;
    tracing::info!(client_id = client.id, by = %user.username, "client created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "client": client.view(false),
            "message": "Client created successfully",
        })),
    ))
}

#[derive(Debug, Default, Deserialize)]
struct ClientQuery {
    #[serde(default)]
    include_sensitive: bool,
}

async fn get_client(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(q): ApiQuery<ClientQuery>,
) -> ApiResult<Json<Value>> {
    let client = clients::get_client(state.db()?, id)
        .await?
        .ok_or_else(|| ApiError::not_found("client"))?;
    Ok(Json(json!({
        "success": true,
        "client": client.view(q.include_sensitive),
    })))
}

async fn update_client(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<ClientPayload>,
) -> ApiResult<Json<Value>> {
    let client = clients::update_client(state.db()?, id, move |profile| payload.apply_to(profile))
        .await?
        .ok_or_else(|| ApiError::not_found("client"))?;
    Ok(Json(json!({
        "success": true,
        "client": client.view(false),
        "message": "Client updated successfully",
    })))
}

async fn delete_client(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    if !clients::delete_client(state.db()?, id).await? {
        return Err(ApiError::not_found("client"));
    }
    tracing::info!(client_id = id, by = %user.username, "client deleted");
    Ok(Json(json!({
        "success": true,
        "message": "Client deleted successfully",
    })))
}

async fn list_contacts(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    let pool = state.db()?;
    let client = clients::get_client(pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("client"))?;
    let contacts = clients::list_contacts(pool, id).await?;
    Ok(Json(json!({
        "success": true,
        "client_id": id,
        "client_name": client.full_name(),
        "contacts": contacts,
    })))
}

async fn add_contact(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<ClientContactRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let contact = req.validate_and_into_contact()?;
    let stored = clients::add_contact(state.db()?, id, &contact)
        .await?
        .ok_or_else(|| ApiError::not_found("client"))?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "contact": stored,
            "message": "Contact record added successfully",
        })),
    ))
}

async fn list_documents(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    let pool = state.db()?;
    let client = clients::get_client(pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("client"))?;
    let documents = clients::list_documents(pool, id).await?;
    Ok(Json(json!({
        "success": true,
        "client_id": id,
        "client_name": client.full_name(),
        "documents": documents,
    })))
}

async fn add_document(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<ClientDocumentRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let document = req.validate_and_into_document()?;
    let stored = clients::add_document(state.db()?, id, &document)
        .await?
        .ok_or_else(|| ApiError::not_found("client"))?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "document": stored,
            "message": "Document added successfully",
        })),
    ))
}

async fn portfolio(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    let p = clients::get_portfolio(state.db()?, id)
        .await?
        .ok_or_else(|| ApiError::not_found("client"))?;
    Ok(Json(json!({
        "success": true,
        "client_id": id,
        "client_name": p.client.full_name(),
        "portfolio_performance": p.performance,
        "projects_summary": {
            "total_projects": p.total_projects,
            "active_projects": p.client.active_projects_count,
            "completed_projects": p.client.completed_projects_count,
        },
        "projects": p.projects,
    })))
}

#[derive(Debug, Default, Deserialize)]
struct LimitQuery {
    limit: Option<i64>,
}

async fn top_investors(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> ApiResult<Json<Value>> {
    let limit = storage::clamp_limit(q.limit, DEFAULT_TOP_LIMIT);
    let rows = clients::top_investors(state.db()?, limit).await?;
    let views: Vec<_> = rows.iter().map(|c| c.view(false)).collect();
    Ok(Json(json!({ "success": true, "top_investors": views })))
}

async fn top_roi(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> ApiResult<Json<Value>> {
    let limit = storage::clamp_limit(q.limit, DEFAULT_TOP_LIMIT);
    let rows = clients::top_roi(state.db()?, limit).await?;
    let views: Vec<_> = rows.iter().map(|c| c.view(false)).collect();
    Ok(Json(json!({ "success": true, "top_roi_clients": views })))
}

async fn stats(State(state): State<AppState>, _user: CurrentUser) -> ApiResult<Json<Value>> {
    let stats = clients::client_stats(state.db()?).await?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}

async fn approve_kyc(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    body: Option<ApiJson<KycApprovalRequest>>,
) -> ApiResult<Json<Value>> {
    let ApiJson(req) = body.unwrap_or(ApiJson(KycApprovalRequest::default()));
    let approved_by = req.approver();
    let client = clients::approve_kyc(state.db()?, id, &approved_by)
        .await?
        .ok_or_else(|| ApiError::not_found("client"))?;
    tracing::info!(client_id = id, approved_by = %approved_by, "kyc approved");
    Ok(Json(json!({
        "success": true,
        "client": client.view(false),
        "message": "Client KYC approved successfully",
    })))
}
