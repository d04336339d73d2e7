use argon2::Params;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use inmo_api::{app_router, AppState};
use inmo_core::auth::{AuthConfig, AuthService, InMemoryUserRepository};
use inmo_core::config::Settings;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const ADMIN_PASSWORD: &str = "s3cret-pass";

struct TestApp {
    router: Router,
    _static_dir: TempDir,
    reports_dir: TempDir,
}

async fn test_app() -> TestApp {
    let static_dir = tempfile::tempdir().unwrap();
    std::fs::write(static_dir.path().join("index.html"), "<html>spa</html>").unwrap();
    let reports_dir = tempfile::tempdir().unwrap();

    let settings = Settings {
        database_url: None,
        sentry_dsn: None,
        jwt_secret: Some("test-secret".into()),
        admin_username: "admin".into(),
        admin_password: Some(ADMIN_PASSWORD.into()),
        admin_email: None,
        static_dir: static_dir.path().to_string_lossy().into_owned(),
        reports_dir: reports_dir.path().to_string_lossy().into_owned(),
        cors_allow_origins: vec!["*".into()],
        port: 0,
        db_max_connections: 1,
    };

    let mut config = AuthConfig::new(b"test-secret".to_vec());
    config.hash_params = Params::new(8, 1, 1, None).unwrap();
    let auth = Arc::new(AuthService::new(Arc::new(InMemoryUserRepository::new()), config));
    auth.seed_admin("admin", "admin@localhost", ADMIN_PASSWORD, Utc::now())
        .await
        .unwrap();

    let state = AppState {
        pool: None,
        auth,
        settings: Arc::new(settings),
    };
    TestApp {
        router: app_router(state),
        _static_dir: static_dir,
        reports_dir,
    }
}

async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &TestApp, req: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, req).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_token(mut req: Request<Body>, token: &str) -> Request<Body> {
    req.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {token}").parse().unwrap(),
    );
    req
}

async fn login(app: &TestApp, password: &str) -> (StatusCode, Value) {
    send_json(
        app,
        post("/api/auth/login", json!({ "username": "Admin", "password": password })),
    )
    .await
}

#[tokio::test]
async fn health_reports_degraded_database() {
    let app = test_app().await;
    let (status, body) = send_json(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "unavailable");
}

#[tokio::test]
async fn compare_works_without_database() {
    let app = test_app().await;
    let (status, body) = send_json(
        &app,
        post(
            "/api/valuation/compare",
            json!({ "properties": [
                { "location": "Barcelona", "surface": 80 },
                { "location": "Badalona", "surface": 80 },
            ]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["analysis"]["total_properties"], 2);
    assert_eq!(body["comparisons"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn compare_needs_two_properties() {
    let app = test_app().await;
    let (status, body) = send_json(
        &app,
        post(
            "/api/valuation/compare",
            json!({ "properties": [{ "location": "Barcelona", "surface": 80 }] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("properties"));
}

#[tokio::test]
async fn persisted_valuations_are_unavailable_without_database() {
    let app = test_app().await;
    let (status, body) = send_json(
        &app,
        post(
            "/api/valuation/quick",
            json!({ "location": "Sitges", "property_type": "apartment", "surface": 60 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn quick_form_with_location_and_surface_passes_validation() {
    let app = test_app().await;
    let (status, _) = send_json(
        &app,
        post("/api/valuation/quick", json!({ "location": "Barcelona", "surface": 80 })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = send_json(
        &app,
        post("/api/valuation/quick", json!({ "location": "Barcelona" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("surface"));
}

#[tokio::test]
async fn invalid_valuation_is_rejected_before_storage() {
    let app = test_app().await;
    let (status, body) = send_json(
        &app,
        post("/api/valuation/property", json!({ "property_type": "apartment", "surface": 60 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("location"));
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = test_app().await;
    let (status, body) = send_json(&app, get("/api/clients")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = send_json(&app, with_token(get("/api/clients"), "garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_then_me() {
    let app = test_app().await;
    let (status, body) = login(&app, ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = send_json(&app, with_token(get("/api/auth/me"), &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "admin");
    assert_eq!(body["user"]["role"], "admin");
    assert!(body["user"].get("password_hash").is_none());

    let (status, body) = send_json(&app, with_token(get("/api/auth/users"), &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"].as_array().unwrap().len(), 1);

    // Authenticated, but the store is missing.
    let (status, _) = send_json(&app, with_token(get("/api/clients"), &token)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn admin_routes_reject_regular_users() {
    let app = test_app().await;
    let (_, body) = login(&app, ADMIN_PASSWORD).await;
    let admin_token = body["token"].as_str().unwrap().to_string();

    let (status, _) = send_json(
        &app,
        with_token(
            post(
                "/api/auth/users",
                json!({ "username": "agent", "email": "agent@example.com", "password": "agent-pass-1" }),
            ),
            &admin_token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send_json(
        &app,
        post("/api/auth/login", json!({ "username": "agent", "password": "agent-pass-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let agent_token = body["token"].as_str().unwrap().to_string();

    let (status, _) = send_json(&app, with_token(get("/api/auth/users"), &agent_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn fifth_failed_login_locks_the_account() {
    let app = test_app().await;
    for _ in 0..4 {
        let (status, _) = login(&app, "wrong-password").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, body) = login(&app, "wrong-password").await;
    assert_eq!(status, StatusCode::LOCKED);
    assert!(body["locked_until"].is_string());

    let (status, _) = login(&app, ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::LOCKED);
}

#[tokio::test]
async fn reset_request_never_reveals_accounts() {
    let app = test_app().await;
    for email in ["admin@localhost", "nobody@example.com"] {
        let (status, body) = send_json(
            &app,
            post("/api/auth/reset-password-request", json!({ "email": email })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }
}

#[tokio::test]
async fn contact_needs_a_way_to_reach_back() {
    let app = test_app().await;
    let (status, _) = send_json(&app, post("/api/contact", json!({ "name": "Ana" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send_json(
        &app,
        post("/api/contact", json!({ "name": "Ana", "phone": "+34 600 000 000" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["contact_id"].as_str().unwrap().starts_with("ESKA"));
}

#[tokio::test]
async fn legal_pages_are_public() {
    let app = test_app().await;
    for uri in ["/api/legal/privacy", "/api/legal/cookies"] {
        let (status, body) = send_json(&app, get(uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["content"].as_str().unwrap().contains("<h1>"));
    }
}

#[tokio::test]
async fn renovation_pdf_is_streamed() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        post(
            "/api/generate-pdf/renovation-proposal",
            json!({
                "location": "Badalona",
                "property_type": "apartment",
                "surface": 70,
                "current_condition": "poor",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with(b"%PDF"));
    let written = std::fs::read_dir(app.reports_dir.path()).unwrap().count();
    assert_eq!(written, 1);
}

#[tokio::test]
async fn renovation_pdf_requires_condition() {
    let app = test_app().await;
    let (status, body) = send_json(
        &app,
        post(
            "/api/generate-pdf/renovation-proposal",
            json!({ "location": "Badalona", "property_type": "apartment", "surface": 70 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("current_condition"));
}

#[tokio::test]
async fn unknown_api_path_is_json_404() {
    let app = test_app().await;
    let (status, body) = send_json(&app, get("/api/does-not-exist")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Endpoint not found");
}

#[tokio::test]
async fn other_paths_fall_back_to_the_spa() {
    let app = test_app().await;
    let (status, body) = send(&app, get("/clients/42")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"<html>spa</html>");
}
