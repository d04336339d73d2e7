use chrono::Utc;
use inmo_api::{app_router, AppState};
use inmo_core::auth::{AuthConfig, AuthService, InMemoryUserRepository};
use inmo_core::config::Settings;
use rand::RngCore;
use sqlx::PgPool;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const GENERATED_SECRET_LEN: usize = 32;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let pool = connect_database(&settings).await;
    let auth = Arc::new(AuthService::new(
        Arc::new(InMemoryUserRepository::new()),
        AuthConfig::new(jwt_secret(&settings)),
    ));
    seed_admin(&auth, &settings).await?;

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port));
    let state = AppState {
        pool,
        auth,
        settings: Arc::new(settings),
    };
    let app = app_router(state);

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Any failure here leaves the API running without a store; store-backed routes answer 503.
async fn connect_database(settings: &Settings) -> Option<PgPool> {
    match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(settings.db_max_connections)
            .connect(db_url)
            .await
        {
            Ok(pool) => match inmo_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    }
}

fn jwt_secret(settings: &Settings) -> Vec<u8> {
    match settings.require_jwt_secret() {
        Ok(secret) => secret.as_bytes().to_vec(),
        Err(_) => {
            tracing::warn!("JWT_SECRET missing; tokens will not survive a restart");
            let mut secret = vec![0u8; GENERATED_SECRET_LEN];
            rand::rngs::OsRng.fill_bytes(&mut secret);
            secret
        }
    }
}

async fn seed_admin(auth: &AuthService, settings: &Settings) -> anyhow::Result<()> {
    let Some(password) = settings.admin_password.as_deref() else {
        tracing::info!("ADMIN_PASSWORD not set; no bootstrap admin");
        return Ok(());
    };
    let username = settings.admin_username.as_str();
    let email = settings
        .admin_email
        .clone()
        .unwrap_or_else(|| format!("{username}@localhost"));
    if auth.seed_admin(username, &email, password, Utc::now()).await? {
        tracing::info!(%username, "bootstrap admin created");
    }
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
