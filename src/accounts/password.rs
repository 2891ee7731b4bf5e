use anyhow::Context;
use tracing::error;

/// bcrypt work factor used unless `BCRYPT_COST` overrides it.
pub const DEFAULT_COST: u32 = 10;

/// Longest password bcrypt can take without truncating: its 72-byte key
/// includes the trailing NUL.
pub const MAX_PASSWORD_BYTES: usize = 71;

pub fn fits_bcrypt(plain: &str) -> bool {
    plain.len() <= MAX_PASSWORD_BYTES
}

/// Hash with bcrypt. Fails instead of truncating an over-long password.
pub fn hash_password(plain: &str, cost: u32) -> anyhow::Result<String> {
    bcrypt::non_truncating_hash(plain, cost).map_err(|e| {
        error!(error = %e, "bcrypt hash error");
        anyhow::anyhow!(e.to_string())
    })
}

/// An over-long password can never match, since no such hash is ever stored.
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    if !fits_bcrypt(plain) {
        return Ok(false);
    }
    bcrypt::non_truncating_verify(plain, hash).map_err(|e| {
        error!(error = %e, "bcrypt verify error");
        anyhow::anyhow!(e.to_string())
    })
}

/// [`hash_password`] on the blocking pool, off the async workers.
pub async fn hash_password_blocking(plain: String, cost: u32) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&plain, cost))
        .await
        .context("join bcrypt hash task")?
}

/// [`verify_password`] on the blocking pool, off the async workers.
pub async fn verify_password_blocking(plain: String, hash: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .context("join bcrypt verify task")?
}
