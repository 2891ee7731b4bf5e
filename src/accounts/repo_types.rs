use std::fmt;

use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Avatar every account starts with until an upload replaces it.
pub const DEFAULT_AVATAR_URL: &str = "/images/default-avatar.png";

/// User record as stored.
///
/// `password` always holds a bcrypt hash once the record has been written.
/// A new plaintext is staged with [`User::set_password`] and only reaches
/// storage hashed, see [`crate::accounts::repo::save`].
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub user_name: String,
    pub email: String,
    pub password: String,
    pub avatar_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[sqlx(skip)]
    #[serde(skip)]
    pending_password: Option<PendingPassword>,
}

impl User {
    pub fn set_password(&mut self, plain: impl Into<String>) {
        self.pending_password = Some(PendingPassword(plain.into()));
    }

    pub fn is_password_modified(&self) -> bool {
        self.pending_password.is_some()
    }

    /// Hash a staged password into `password`. No-op when nothing is staged.
    pub(crate) async fn hash_pending_password(&mut self, cost: u32) -> anyhow::Result<()> {
        if let Some(PendingPassword(plain)) = self.pending_password.take() {
            self.password = super::password::hash_password_blocking(plain, cost).await?;
        }
        Ok(())
    }
}

/// Plaintext password awaiting hashing. Redacted in debug output.
#[derive(Clone, Default)]
struct PendingPassword(String);

impl fmt::Debug for PendingPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PendingPassword(***)")
    }
}

/// Fields a caller supplies to register an account.
pub struct NewUser {
    pub user_name: String,
    pub email: String,
    pub password: String,
}

/// Row handed to the store on insert; `password_hash` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUserRow {
    pub user_name: String,
    pub email: String,
    pub password_hash: String,
    pub avatar_url: String,
}

#[cfg(test)]
impl NewUserRow {
    /// Materialize the row as a stored user, the way the database would.
    pub fn into_user(self, id: Uuid, now: OffsetDateTime) -> User {
        User {
            id,
            user_name: self.user_name,
            email: self.email,
            password: self.password_hash,
            avatar_url: self.avatar_url,
            created_at: now,
            updated_at: now,
            pending_password: None,
        }
    }
}

/// User as returned when the stored hash must not leave the service.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub user_name: String,
    pub email: String,
    pub avatar_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            user_name: u.user_name,
            email: u.email,
            avatar_url: u.avatar_url,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}
