use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use inmo_core::domain::contract::{ProjectAnalyticsRequest, ProjectImageRequest, ProjectPayload};
use inmo_core::storage::{self, projects};
use inmo_core::valuation::PropertyType;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::AppState;

const DEFAULT_LIST_LIMIT: i64 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route("/projects/featured", get(featured))
        .route("/projects/by-category/:category", get(by_category))
        .route("/projects/search", get(search))
        .route("/projects/stats", get(stats))
        .route(
            "/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route(
            "/projects/:id/analytics",
            get(list_analytics).post(add_analytics),
        )
        .route("/projects/:id/images", get(list_images).post(add_image))
}

#[derive(Debug, Default, Deserialize)]
struct ProjectListQuery {
    category: Option<String>,
    status: Option<String>,
    client_id: Option<i64>,
    location: Option<String>,
    limit: Option<i64>,
}

async fn list_projects(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<ProjectListQuery>,
) -> ApiResult<Json<Value>> {
    let filter = projects::ProjectFilter {
        category: q.category,
        status: q.status,
        client_id: q.client_id,
        location: q.location,
        limit: Some(storage::clamp_limit(q.limit, DEFAULT_LIST_LIMIT)),
    };
    let rows = projects::list_projects(state.db()?, &filter).await?;
    Ok(Json(json!({
        "success": true,
        "total": rows.len(),
        "projects": rows,
    })))
}

async fn get_project(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    let project = projects::get_project(state.db()?, id)
        .await?
        .ok_or_else(|| ApiError::not_found("project"))?;
    Ok(Json(json!({ "success": true, "project": project })))
}

async fn create_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(payload): ApiJson<ProjectPayload>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let details = payload.validate_and_into_details()?;
    let project = projects::create_project(state.db()?, details).await?;
    tracing::info!(project_id = project.id, by = %user.username, "project created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "project": project,
            "message": "Project created successfully",
        })),
    ))
}

async fn update_project(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<ProjectPayload>,
) -> ApiResult<Json<Value>> {
    let project = projects::update_project(state.db()?, id, move |d| payload.apply_update(d))
        .await?
        .ok_or_else(|| ApiError::not_found("project"))?;
    Ok(Json(json!({
        "success": true,
        "project": project,
        "message": "Project updated successfully",
    })))
}

async fn delete_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    if !projects::delete_project(state.db()?, id).await? {
        return Err(ApiError::not_found("project"));
    }
    tracing::info!(project_id = id, by = %user.username, "project deleted");
    Ok(Json(json!({
        "success": true,
        "message": "Project deleted successfully",
    })))
}

#[derive(Debug, Default, Deserialize)]
struct LimitQuery {
    limit: Option<i64>,
}

async fn featured(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> ApiResult<Json<Value>> {
    let limit = storage::clamp_limit(q.limit, projects::DEFAULT_FEATURED_LIMIT);
    let rows = projects::featured_projects(state.db()?, limit).await?;
    Ok(Json(json!({ "success": true, "projects": rows })))
}

async fn by_category(
    State(state): State<AppState>,
    ApiPath(category): ApiPath<String>,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> ApiResult<Json<Value>> {
    let rows = projects::projects_by_category(state.db()?, &category, q.limit).await?;
    Ok(Json(json!({
        "success": true,
        "category": category,
        "total": rows.len(),
        "projects": rows,
    })))
}

async fn search(
    State(state): State<AppState>,
    ApiQuery(mut q): ApiQuery<projects::ProjectSearch>,
) -> ApiResult<Json<Value>> {
    // Project types are stored under their canonical name.
    if let Some(t) = q.property_type.as_deref().and_then(PropertyType::parse) {
        q.property_type = Some(t.as_str().to_string());
    }
    let rows = projects::search_projects(state.db()?, &q).await?;
    Ok(Json(json!({
        "success": true,
        "total": rows.len(),
        "query": q,
        "projects": rows,
    })))
}

async fn stats(State(state): State<AppState>, _user: CurrentUser) -> ApiResult<Json<Value>> {
    let stats = projects::project_stats(state.db()?).await?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}

async fn list_analytics(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    let pool = state.db()?;
    let project = projects::get_project(pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("project"))?;
    let rows = projects::list_analytics(pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("project"))?;
    let views: Vec<_> = rows.iter().map(|a| a.view()).collect();
    Ok(Json(json!({
        "success": true,
        "project_id": id,
        "project_title": project.details.title,
        "analytics": views,
    })))
}

async fn add_analytics(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<ProjectAnalyticsRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let analytics = req.validate_and_into_analytics()?;
    let stored = projects::add_analytics(state.db()?, id, &analytics)
        .await?
        .ok_or_else(|| ApiError::not_found("project"))?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "analytics": stored.view(),
            "message": "Analytics added successfully",
        })),
    ))
}

async fn list_images(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    let images = projects::list_images(state.db()?, id)
        .await?
        .ok_or_else(|| ApiError::not_found("project"))?;
    Ok(Json(json!({
        "success": true,
        "project_id": id,
        "images": images,
    })))
}

async fn add_image(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<ProjectImageRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let image = req.validate_and_into_image()?;
    let stored = projects::add_image(state.db()?, id, &image)
        .await?
        .ok_or_else(|| ApiError::not_found("project"))?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "image": stored,
            "message": "Image added successfully",
        })),
    ))
}
