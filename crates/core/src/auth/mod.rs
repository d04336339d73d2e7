//! Back-office accounts: password login with lockout, bearer tokens, user administration.

pub mod repository;

pub use repository::{InMemoryUserRepository, UserRepository};

use crate::error::CoreError;
use argon2::{
    password_hash::{Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm as Argon2Algorithm, Argon2, Params, Version,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const TOKEN_TTL_HOURS: i64 = 24;
pub const RESET_TOKEN_TTL_HOURS: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    pub full_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub failed_login_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub reset_token: Option<String>,
    #[serde(skip)]
    pub reset_token_expires: Option<DateTime<Utc>>,
}

impl User {
    /// An active account with no login history. The id is assigned by the repository.
    pub fn new(
        username: &str,
        email: &str,
        password_hash: &str,
        role: Role,
        full_name: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            username: normalize_username(username),
            email: email.trim().to_string(),
            password_hash: password_hash.to_string(),
            role,
            full_name: full_name.trim().to_string(),
            is_active: true,
            created_at,
            last_login: None,
            failed_login_attempts: 0,
            locked_until: None,
            reset_token: None,
            reset_token_expires: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn locked_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.locked_until.filter(|until| *until > now)
    }
}

pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq)]
pub struct LockoutPolicy {
    pub max_failed_attempts: u32,
    pub lock_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lock_duration: Duration::minutes(30),
        }
    }
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: Vec<u8>,
    pub token_ttl: Duration,
    pub reset_token_ttl: Duration,
    pub lockout: LockoutPolicy,
    pub min_password_len: usize,
    pub hash_params: Params,
}

impl AuthConfig {
    pub fn new(jwt_secret: Vec<u8>) -> Self {
        Self {
            jwt_secret,
            token_ttl: Duration::hours(TOKEN_TTL_HOURS),
            reset_token_ttl: Duration::hours(RESET_TOKEN_TTL_HOURS),
            lockout: LockoutPolicy::default(),
            min_password_len: MIN_PASSWORD_LEN,
            hash_params: Params::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username and password are required")]
    MissingCredentials,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("account locked until {until}")]
    Locked { until: DateTime<Utc> },
    #[error("account is deactivated")]
    Inactive,
    #[error("authorization token is missing")]
    MissingToken,
    #[error("token has expired")]
    TokenExpired,
    #[error("token is invalid")]
    InvalidToken,
    #[error("admin privileges required")]
    Forbidden,
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Validation(#[from] CoreError),
    #[error("auth failure: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AuthError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(format!("{e:#}"))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    uid: i64,
    role: Role,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: User,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdateRequest {
    pub email: Option<String>,
    pub role: Option<String>,
    pub full_name: Option<String>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

fn hasher(params: Params) -> Argon2<'static> {
    Argon2::new(Argon2Algorithm::Argon2id, Version::V0x13, params)
}

fn hash_with(params: Params, password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    hasher(params)
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Internal(format!("password hashing failed: {e}")))
}

fn verify_with(params: Params, hash: &str, candidate: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AuthError::Internal(format!("stored password hash is invalid: {e}")))?;
    match hasher(params).verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(PasswordHashError::Password) => Ok(false),
        Err(other) => Err(AuthError::Internal(format!(
            "password verification failed: {other}"
        ))),
    }
}

pub struct AuthService {
    repo: Arc<dyn UserRepository>,
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthService {
    pub fn new(repo: Arc<dyn UserRepository>, config: AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(&config.jwt_secret);
        let decoding_key = DecodingKey::from_secret(&config.jwt_secret);
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        Self {
            repo,
            config,
            encoding_key,
            decoding_key,
            validation,
        }
    }

    pub fn token_ttl(&self) -> Duration {
        self.config.token_ttl
    }

    /// Argon2 runs on the blocking pool, never on a runtime worker.
    pub async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let params = self.config.hash_params.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hash_with(params, &password))
            .await
            .map_err(|e| AuthError::Internal(format!("password hashing task failed: {e}")))?
    }

    async fn verify_password(&self, hash: &str, candidate: &str) -> Result<bool, AuthError> {
        let params = self.config.hash_params.clone();
        let (hash, candidate) = (hash.to_owned(), candidate.to_owned());
        tokio::task::spawn_blocking(move || verify_with(params, &hash, &candidate))
            .await
            .map_err(|e| AuthError::Internal(format!("password verification task failed: {e}")))?
    }

    fn check_password_strength(&self, field: &str, password: &str) -> Result<(), AuthError> {
        if password.chars().count() < self.config.min_password_len {
            return Err(CoreError::validation(
                field,
                format!(
                    "must be at least {} characters long",
                    self.config.min_password_len
                ),
            )
            .into());
        }
        Ok(())
    }

    pub fn issue_token(&self, user: &User, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user.username.clone(),
            uid: user.id,
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.config.token_ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("failed to sign token: {e}")))
    }

    /// Resolves a bearer token to the live account it was issued for.
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|err| {
            match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            }
        })?;

        let user = self
            .repo
            .get(&data.claims.sub)
            .await?
            .filter(|u| u.id == data.claims.uid)
            .ok_or(AuthError::InvalidToken)?;
        if !user.is_active {
            return Err(AuthError::Inactive);
        }
        Ok(user)
    }

    /// Password login. The failed-attempt counter lives in the repository; reaching the limit
    /// locks the account and reports it as locked right away.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome, AuthError> {
        let username = normalize_username(username);
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let user = self
            .repo
            .get(&username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if let Some(until) = user.locked_at(now) {
            return Err(AuthError::Locked { until });
        }
        if !user.is_active {
            return Err(AuthError::Inactive);
        }

        if !self.verify_password(&user.password_hash, password).await? {
            let updated = self
                .repo
                .register_failed_login(&username, now, &self.config.lockout)
                .await?;
            if let Some(until) = updated.as_ref().and_then(|u| u.locked_at(now)) {
                tracing::warn!(username = %username, %until, "account locked after failed logins");
                return Err(AuthError::Locked { until });
            }
            tracing::info!(username = %username, "failed login");
            return Err(AuthError::InvalidCredentials);
        }

        let user = self
            .repo
            .register_successful_login(&username, now)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let token = self.issue_token(&user, now)?;
        tracing::info!(username = %username, "login");
        Ok(LoginOutcome {
            token,
            token_type: "Bearer",
            expires_in: self.config.token_ttl.num_seconds(),
            user,
        })
    }

    pub async fn change_password(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if current_password.is_empty() {
            return Err(CoreError::missing("current_password").into());
        }
        self.check_password_strength("new_password", new_password)?;

        let mut stored = self
            .repo
            .get(&user.username)
            .await?
            .ok_or_else(|| AuthError::UserNotFound(user.username.clone()))?;
        if !self.verify_password(&stored.password_hash, current_password).await? {
            return Err(AuthError::InvalidCredentials);
        }
        stored.password_hash = self.hash_password(new_password).await?;
        self.repo.update(&stored).await?;
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        Ok(self.repo.list().await?)
    }

    pub async fn create_user(&self, req: NewUserRequest, now: DateTime<Utc>) -> Result<User, AuthError> {
        let username = req
            .username
            .as_deref()
            .map(normalize_username)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| CoreError::missing("username"))?;
        let email = req
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| CoreError::missing("email"))?;
        if !email.contains('@') {
            return Err(CoreError::validation("email", "must be a valid email address").into());
        }
        let password = req.password.as_deref().ok_or_else(|| CoreError::missing("password"))?;
        self.check_password_strength("password", password)?;
        let role = match req.role.as_deref() {
            Some(r) => Role::parse(r)
                .ok_or_else(|| CoreError::validation("role", "must be admin or user"))?,
            None => Role::User,
        };

        let user = User::new(
            &username,
            email,
            &self.hash_password(password).await?,
            role,
            req.full_name.as_deref().unwrap_or_default(),
            now,
        );
        let created = self
            .repo
            .insert(user)
            .await?
            .ok_or_else(|| AuthError::Conflict("username or email already exists".to_string()))?;
        tracing::info!(username = %created.username, role = ?created.role, "user created");
        Ok(created)
    }

    pub async fn update_user(&self, username: &str, req: UserUpdateRequest) -> Result<User, AuthError> {
        let username = normalize_username(username);
        let mut user = self
            .repo
            .get(&username)
            .await?
            .ok_or_else(|| AuthError::UserNotFound(username.clone()))?;

        if let Some(email) = req.email.as_deref().map(str::trim) {
            if !email.contains('@') {
                return Err(CoreError::validation("email", "must be a valid email address").into());
            }
            if let Some(other) = self.repo.find_by_email(email).await? {
                if other.id != user.id {
                    return Err(AuthError::Conflict("email already in use".to_string()));
                }
            }
            user.email = email.to_string();
        }
        if let Some(role) = req.role.as_deref() {
            user.role =
                Role::parse(role).ok_or_else(|| CoreError::validation("role", "must be admin or user"))?;
        }
        if let Some(full_name) = req.full_name {
            user.full_name = full_name.trim().to_string();
        }
        if let Some(active) = req.is_active {
            user.is_active = active;
        }
        if let Some(password) = req.password.as_deref() {
            self.check_password_strength("password", password)?;
            user.password_hash = self.hash_password(password).await?;
        }

        if !self.repo.update(&user).await? {
            return Err(AuthError::UserNotFound(username));
        }
        Ok(user)
    }

    pub async fn delete_user(&self, acting: &User, username: &str) -> Result<(), AuthError> {
        let username = normalize_username(username);
        if acting.username == username {
            return Err(AuthError::Conflict("cannot delete your own account".to_string()));
        }
        if !self.repo.delete(&username).await? {
            return Err(AuthError::UserNotFound(username));
        }
        tracing::info!(username = %username, by = %acting.username, "user deleted");
        Ok(())
    }

    pub async fn unlock_user(&self, username: &str) -> Result<User, AuthError> {
        let username = normalize_username(username);
        let mut user = self
            .repo
            .get(&username)
            .await?
            .ok_or_else(|| AuthError::UserNotFound(username.clone()))?;
        user.failed_login_attempts = 0;
        user.locked_until = None;
        self.repo.update(&user).await?;
        Ok(user)
    }

    /// Stores a one-hour reset token when the email belongs to an account. Unknown emails are
    /// accepted silently so the endpoint cannot be used to probe accounts.
    pub async fn request_password_reset(&self, email: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
        let Some(mut user) = self.repo.find_by_email(email.trim()).await? else {
            return Ok(());
        };
        let mut raw = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut raw);
        user.reset_token = Some(URL_SAFE_NO_PAD.encode(raw));
        user.reset_token_expires = Some(now + self.config.reset_token_ttl);
        self.repo.update(&user).await?;
        tracing::info!(username = %user.username, "password reset token issued");
        Ok(())
    }

    /// Creates the bootstrap admin unless an account with that username already exists.
    pub async fn seed_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        if self.repo.get(&normalize_username(username)).await?.is_some() {
            return Ok(false);
        }
        self.create_user(
            NewUserRequest {
                username: Some(username.to_string()),
                email: Some(email.to_string()),
                password: Some(password.to_string()),
                role: Some("admin".to_string()),
                full_name: Some("Administrator".to_string()),
            },
            now,
        )
        .await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        let mut config = AuthConfig::new(b"0123456789abcdef0123456789abcdef".to_vec());
        // Minimal argon2 cost keeps the suite fast.
        config.hash_params = Params::new(8, 1, 1, None).unwrap();
        AuthService::new(Arc::new(InMemoryUserRepository::new()), config)
    }

    async fn seeded() -> AuthService {
        let svc = service();
        svc.seed_admin("Admin", "admin@example.com", "s3cret-pass", Utc::now())
            .await
            .unwrap();
        svc
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn hashing_and_verification_run_on_the_blocking_pool() {
        let svc = service();
        let hash = svc.hash_password("s3cret-pass").await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(svc.verify_password(&hash, "s3cret-pass").await.unwrap());
        assert!(!svc.verify_password(&hash, "wrong-pass").await.unwrap());
        assert!(matches!(
            svc.verify_password("not-a-hash", "s3cret-pass").await,
            Err(AuthError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn login_is_case_insensitive_and_issues_valid_token() {
        let svc = seeded().await;
        let outcome = svc.login("ADMIN", "s3cret-pass", Utc::now()).await.unwrap();
        assert_eq!(outcome.expires_in, 24 * 3600);
        assert!(outcome.user.last_login.is_some());

        let user = svc.authenticate(&outcome.token).await.unwrap();
        assert_eq!(user.username, "admin");
        assert!(user.is_admin());
    }

    #[tokio::test]
    async fn fifth_failure_locks_the_account() {
        let svc = seeded().await;
        let now = Utc::now();
        for _ in 0..4 {
            assert!(matches!(
                svc.login("admin", "wrong-pass", now).await,
                Err(AuthError::InvalidCredentials)
            ));
        }
        let until = match svc.login("admin", "wrong-pass", now).await {
            Err(AuthError::Locked { until }) => until,
            other => panic!("expected lock, got {other:?}"),
        };
        assert_eq!(until, now + Duration::minutes(30));

        // Correct password is refused while locked.
        assert!(matches!(
            svc.login("admin", "s3cret-pass", now + Duration::minutes(29)).await,
            Err(AuthError::Locked { .. })
        ));
        // And accepted once the lock has expired; the counter resets.
        let ok = svc
            .login("admin", "s3cret-pass", now + Duration::minutes(31))
            .await
            .unwrap();
        assert_eq!(ok.user.failed_login_attempts, 0);
    }

    #[tokio::test]
    async fn unlock_clears_lock() {
        let svc = seeded().await;
        let now = Utc::now();
        for _ in 0..5 {
            let _ = svc.login("admin", "nope-nope", now).await;
        }
        let u = svc.unlock_user("admin").await.unwrap();
        assert!(u.locked_until.is_none());
        assert!(svc.login("admin", "s3cret-pass", now).await.is_ok());
    }

    #[tokio::test]
    async fn inactive_and_unknown_users_are_refused() {
        let svc = seeded().await;
        assert!(matches!(
            svc.login("ghost", "whatever1", Utc::now()).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            svc.login("", "", Utc::now()).await,
            Err(AuthError::MissingCredentials)
        ));

        svc.create_user(
            NewUserRequest {
                username: Some("agent".into()),
                email: Some("agent@example.com".into()),
                password: Some("agent-pass".into()),
                ..Default::default()
            },
            Utc::now(),
        )
        .await
        .unwrap();
        svc.update_user(
            "agent",
            UserUpdateRequest {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(matches!(
            svc.login("agent", "agent-pass", Utc::now()).await,
            Err(AuthError::Inactive)
        ));
    }

    #[tokio::test]
    async fn tampered_and_expired_tokens_are_rejected() {
        let svc = seeded().await;
        let outcome = svc.login("admin", "s3cret-pass", Utc::now()).await.unwrap();
        let mut tampered = outcome.token.clone();
        tampered.push('x');
        assert!(matches!(
            svc.authenticate(&tampered).await,
            Err(AuthError::InvalidToken)
        ));

        let stale = svc
            .issue_token(&outcome.user, Utc::now() - Duration::hours(25))
            .unwrap();
        assert!(matches!(
            svc.authenticate(&stale).await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn password_rules() {
        let svc = seeded().await;
        let admin = svc.login("admin", "s3cret-pass", Utc::now()).await.unwrap().user;

        assert!(matches!(
            svc.change_password(&admin, "s3cret-pass", "short").await,
            Err(AuthError::Validation(CoreError::Validation { ref field, .. })) if field == "new_password"
        ));
        assert!(matches!(
            svc.change_password(&admin, "not-it-at-all", "long-enough-1").await,
            Err(AuthError::InvalidCredentials)
        ));
        svc.change_password(&admin, "s3cret-pass", "long-enough-1")
            .await
            .unwrap();
        assert!(svc.login("admin", "long-enough-1", Utc::now()).await.is_ok());
    }

    #[tokio::test]
    async fn admin_management() {
        let svc = seeded().await;
        let admin = svc.login("admin", "s3cret-pass", Utc::now()).await.unwrap().user;

        let dup = svc
            .create_user(
                NewUserRequest {
                    username: Some("ADMIN".into()),
                    email: Some("x@example.com".into()),
                    password: Some("whatever-1".into()),
                    ..Default::default()
                },
                Utc::now(),
            )
            .await;
        assert!(matches!(dup, Err(AuthError::Conflict(_))));

        assert!(matches!(
            svc.delete_user(&admin, "Admin").await,
            Err(AuthError::Conflict(_))
        ));
        assert!(matches!(
            svc.delete_user(&admin, "ghost").await,
            Err(AuthError::UserNotFound(_))
        ));
        assert!(!svc
            .seed_admin("admin", "admin@example.com", "s3cret-pass", Utc::now())
            .await
            .unwrap());
        assert_eq!(svc.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reset_request_stores_token_only_for_known_email() {
        let svc = seeded().await;
        let now = Utc::now();
        svc.request_password_reset("nobody@example.com", now).await.unwrap();
        svc.request_password_reset("ADMIN@example.com", now).await.unwrap();

        let admin = svc.repo.get("admin").await.unwrap().unwrap();
        let token = admin.reset_token.unwrap();
        assert_eq!(token.len(), 43);
        assert!(!token.contains('+') && !token.contains('/') && !token.contains('='));
        assert_eq!(admin.reset_token_expires, Some(now + Duration::hours(1)));
    }
}
