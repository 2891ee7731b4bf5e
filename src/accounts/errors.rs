use thiserror::Error;

/// Outcome of an account operation that did not succeed.
///
/// Everything except `Internal` is an expected rejection whose message is
/// safe to hand to the caller. `Internal` wraps infrastructure faults; its
/// cause is logged and never sent over the wire.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("User already exist.")]
    AlreadyExists,
    #[error("User doesn't exist.")]
    NotFound,
    #[error("Invalid email or password.")]
    InvalidCredentials,
    #[error("New password and confirm password do not match.")]
    PasswordMismatch,
    #[error("Password is too long.")]
    PasswordTooLong,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Errors raised by a [`UserStore`](super::store::UserStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::DuplicateEmail,
            _ => Self::Backend(anyhow::Error::new(e)),
        }
    }
}

impl From<StoreError> for AccountError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => Self::AlreadyExists,
            StoreError::Backend(e) => Self::Internal(e),
        }
    }
}
