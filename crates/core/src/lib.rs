pub mod auth;
pub mod domain;
pub mod error;
pub mod report;
pub mod storage;
pub mod time;
pub mod valuation;

pub mod config {
    use anyhow::Context;

    const DEFAULT_ADMIN_USERNAME: &str = "admin";
    const DEFAULT_STATIC_DIR: &str = "static";
    const DEFAULT_REPORTS_DIR: &str = "reports";
    const DEFAULT_PORT: u16 = 5000;
    const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub jwt_secret: Option<String>,
        pub admin_username: String,
        pub admin_password: Option<String>,
        pub admin_email: Option<String>,
        pub static_dir: String,
        pub reports_dir: String,
        pub cors_allow_origins: Vec<String>,
        pub port: u16,
        pub db_max_connections: u32,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let port = match std::env::var("PORT") {
                Ok(v) => v
                    .parse()
                    .with_context(|| format!("PORT must be a valid port number (got {v})"))?,
                Err(_) => DEFAULT_PORT,
            };

            let db_max_connections = std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);

            let cors_allow_origins = std::env::var("CORS_ALLOW_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();

            Ok(Self {
                database_url: non_empty_var("DATABASE_URL"),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
                jwt_secret: non_empty_var("JWT_SECRET"),
                admin_username: non_empty_var("ADMIN_USERNAME")
                    .unwrap_or_else(|| DEFAULT_ADMIN_USERNAME.to_string()),
                admin_password: non_empty_var("ADMIN_PASSWORD"),
                admin_email: non_empty_var("ADMIN_EMAIL"),
                static_dir: non_empty_var("STATIC_DIR")
                    .unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string()),
                reports_dir: non_empty_var("REPORTS_DIR")
                    .unwrap_or_else(|| DEFAULT_REPORTS_DIR.to_string()),
                cors_allow_origins,
                port,
                db_max_connections,
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_jwt_secret(&self) -> anyhow::Result<&str> {
            self.jwt_secret.as_deref().context("JWT_SECRET is required")
        }

        pub fn allows_any_origin(&self) -> bool {
            self.cors_allow_origins.iter().any(|o| o == "*")
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}
