//! Write path for user records.
//!
//! Every write goes through here so a plaintext password can never reach a
//! [`UserStore`]: creation hashes the supplied password exactly once, and
//! updates hash a staged password only when one was set.

use anyhow::Context;
use tracing::debug;

use super::errors::StoreError;
use super::repo_types::{NewUser, NewUserRow, User, DEFAULT_AVATAR_URL};
use super::store::UserStore;

/// Insert a new user, hashing its password first.
pub async fn create(store: &dyn UserStore, new: NewUser, cost: u32) -> Result<User, StoreError> {
    let password_hash = super::password::hash_password_blocking(new.password, cost)
        .await
        .context("hash password on create")?;
    let row = NewUserRow {
        user_name: new.user_name,
        email: new.email,
        password_hash,
        avatar_url: DEFAULT_AVATAR_URL.to_string(),
    };
    let user = store.insert(row).await?;
    debug!(user_id = %user.id, "user created");
    Ok(user)
}

/// Persist changes to an existing user, re-hashing a staged password.
pub async fn save(store: &dyn UserStore, user: &mut User, cost: u32) -> Result<User, StoreError> {
    if user.is_password_modified() {
        user.hash_pending_password(cost)
            .await
            .context("hash password on save")?;
        debug!(user_id = %user.id, "password re-hashed before write");
    }
    let saved = store.update(user).await?;
    Ok(saved)
}
