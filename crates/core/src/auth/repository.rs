use crate::auth::{LockoutPolicy, User};
use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Storage for back-office accounts. Usernames are stored lowercased; lookups expect that.
#[async_trait::async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, username: &str) -> anyhow::Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    async fn list(&self) -> anyhow::Result<Vec<User>>;

    /// Stores a new account and assigns its id. `None` when the username or email is taken.
    async fn insert(&self, user: User) -> anyhow::Result<Option<User>>;

    /// Replaces the stored account with the same id. `false` when it no longer exists.
    async fn update(&self, user: &User) -> anyhow::Result<bool>;

    async fn delete(&self, username: &str) -> anyhow::Result<bool>;

    /// Bumps the failed-attempt counter and locks the account once the policy limit is reached,
    /// as one atomic step. Returns the updated account.
    async fn register_failed_login(
        &self,
        username: &str,
        now: DateTime<Utc>,
        policy: &LockoutPolicy,
    ) -> anyhow::Result<Option<User>>;

    /// Clears the failed-attempt counter and lock and stamps `last_login`.
    async fn register_successful_login(
        &self,
        username: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<User>>;
}

/// Process-local user table behind a mutex.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    inner: Mutex<UserTable>,
}

#[derive(Debug, Default)]
struct UserTable {
    users: Vec<User>,
    next_id: i64,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_table<T>(&self, f: impl FnOnce(&mut UserTable) -> T) -> anyhow::Result<T> {
        let mut table = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("user table lock poisoned"))?;
        Ok(f(&mut table))
    }
}

impl UserTable {
    fn find_mut(&mut self, username: &str) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.username == username)
    }
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get(&self, username: &str) -> anyhow::Result<Option<User>> {
        self.with_table(|t| t.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.with_table(|t| {
            t.users
                .iter()
                .find(|u| u.email.eq_ignore_ascii_case(email))
                .cloned()
        })
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        self.with_table(|t| t.users.clone())
    }

    async fn insert(&self, mut user: User) -> anyhow::Result<Option<User>> {
        self.with_table(|t| {
            let taken = t.users.iter().any(|u| {
                u.username == user.username || u.email.eq_ignore_ascii_case(&user.email)
            });
            if taken {
                return None;
            }
            t.next_id += 1;
            user.id = t.next_id;
            t.users.push(user.clone());
            Some(user)
        })
    }

    async fn update(&self, user: &User) -> anyhow::Result<bool> {
        self.with_table(|t| match t.users.iter_mut().find(|u| u.id == user.id) {
            Some(slot) => {
                *slot = user.clone();
                true
            }
            None => false,
        })
    }

    async fn delete(&self, username: &str) -> anyhow::Result<bool> {
        self.with_table(|t| {
            let before = t.users.len();
            t.users.retain(|u| u.username != username);
            t.users.len() != before
        })
    }

    async fn register_failed_login(
        &self,
        username: &str,
        now: DateTime<Utc>,
        policy: &LockoutPolicy,
    ) -> anyhow::Result<Option<User>> {
        self.with_table(|t| {
            let user = t.find_mut(username)?;
            user.failed_login_attempts += 1;
            if user.failed_login_attempts >= policy.max_failed_attempts {
                user.locked_until = Some(now + policy.lock_duration);
            }
            Some(user.clone())
        })
    }

    async fn register_successful_login(
        &self,
        username: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<User>> {
        self.with_table(|t| {
            let user = t.find_mut(username)?;
            user.failed_login_attempts = 0;
            user.locked_until = None;
            user.last_login = Some(now);
            Some(user.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    fn user(username: &str, email: &str) -> User {
        User::new(username, email, "hash", Role::User, "", Utc::now())
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_rejects_duplicates() {
        let repo = InMemoryUserRepository::new();
        let a = repo.insert(user("ana", "ana@x.es")).await.unwrap().unwrap();
        let b = repo.insert(user("bob", "bob@x.es")).await.unwrap().unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        assert!(repo.insert(user("ana", "other@x.es")).await.unwrap().is_none());
        assert!(repo.insert(user("carla", "ANA@x.es")).await.unwrap().is_none());
        assert_eq!(repo.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_logins_lock_at_policy_limit() {
        let repo = InMemoryUserRepository::new();
        repo.insert(user("ana", "ana@x.es")).await.unwrap();
        let policy = LockoutPolicy::default();
        let now = Utc::now();

        for _ in 1..policy.max_failed_attempts {
            let u = repo.register_failed_login("ana", now, &policy).await.unwrap().unwrap();
            assert!(u.locked_until.is_none());
        }
        let u = repo.register_failed_login("ana", now, &policy).await.unwrap().unwrap();
        assert_eq!(u.locked_until, Some(now + policy.lock_duration));

        let u = repo.register_successful_login("ana", now).await.unwrap().unwrap();
        assert_eq!(u.failed_login_attempts, 0);
        assert!(u.locked_until.is_none());
        assert_eq!(u.last_login, Some(now));
    }

    #[tokio::test]
    async fn unknown_users_are_none() {
        let repo = InMemoryUserRepository::new();
        let policy = LockoutPolicy::default();
        assert!(repo.get("ghost").await.unwrap().is_none());
        assert!(repo
            .register_failed_login("ghost", Utc::now(), &policy)
            .await
            .unwrap()
            .is_none());
        assert!(!repo.delete("ghost").await.unwrap());
    }
}
