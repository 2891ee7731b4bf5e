use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;
#[cfg(test)]
use {time::OffsetDateTime, tokio::sync::RwLock};

use super::errors::StoreError;
use super::repo_types::{NewUserRow, User};

/// Persistence for user records.
///
/// Implementations must reject a second record with an email that is
/// already stored with [`StoreError::DuplicateEmail`].
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn insert(&self, row: NewUserRow) -> Result<User, StoreError>;
    /// Write `user_name`, `password` and `avatar_url` back and bump `updated_at`.
    async fn update(&self, user: &User) -> Result<User, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, user_name, email, password, avatar_url, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, user_name, email, password, avatar_url, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn insert(&self, row: NewUserRow) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_name, email, password, avatar_url)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_name, email, password, avatar_url, created_at, updated_at
            "#,
        )
        .bind(&row.user_name)
        .bind(&row.email)
        .bind(&row.password_hash)
        .bind(&row.avatar_url)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET user_name = $2, password = $3, avatar_url = $4, updated_at = now()
             WHERE id = $1
            RETURNING id, user_name, email, password, avatar_url, created_at, updated_at
            "#,
        )
        .bind(user.id)
        .bind(&user.user_name)
        .bind(&user.password)
        .bind(&user.avatar_url)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }
}

/// In-process store with the same uniqueness rule as the `users` table.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
}

#[cfg(test)]
impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

#[cfg(test)]
#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn insert(&self, row: NewUserRow) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == row.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = row.into_user(Uuid::new_v4(), OffsetDateTime::now_utc());
        users.push(user.clone());
        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        let stored = users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| anyhow::anyhow!("user {} vanished before update", user.id))?;
        stored.user_name = user.user_name.clone();
        stored.password = user.password.clone();
        stored.avatar_url = user.avatar_url.clone();
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(stored.clone())
    }
}

/// Store that always misses the lookup and then loses the insert, as when
/// a concurrent signup for the same email commits in between.
#[cfg(test)]
pub struct LateDuplicateStore;

#[cfg(test)]
#[async_trait]
impl UserStore for LateDuplicateStore {
    async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
        Ok(None)
    }

    async fn find_by_id(&self, _id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(None)
    }

    async fn insert(&self, _row: NewUserRow) -> Result<User, StoreError> {
        Err(StoreError::DuplicateEmail)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        Err(anyhow::anyhow!("no user {}", user.id).into())
    }
}
