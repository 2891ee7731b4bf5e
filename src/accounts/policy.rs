use std::str::FromStr;

use axum::http::StatusCode;
use serde::Deserialize;

use super::errors::AccountError;

/// Operations exposed over HTTP, used to pick a status code per outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Signup,
    Login,
    ChangePassword,
    Upload,
    Logout,
}

/// How account outcomes are mapped onto HTTP status codes.
///
/// `Legacy` keeps the historical mapping existing clients depend on, where
/// several rejections share the success status. `Strict` gives each
/// rejection its own status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponsePolicy {
    #[default]
    Legacy,
    Strict,
}

impl FromStr for ResponsePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "strict" => Ok(Self::Strict),
            other => anyhow::bail!("unknown response policy: {other}"),
        }
    }
}

impl ResponsePolicy {
    pub fn success(self, op: Operation) -> StatusCode {
        match (self, op) {
            (_, Operation::ChangePassword) => StatusCode::OK,
            (Self::Strict, Operation::Login) => StatusCode::OK,
            _ => StatusCode::CREATED,
        }
    }

    pub fn rejection(self, op: Operation, err: &AccountError) -> StatusCode {
        if let AccountError::Internal(_) = err {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        // unknown account on upload has always been a 404
        if op == Operation::Upload {
            return match err {
                AccountError::NotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            };
        }
        match self {
            Self::Legacy => StatusCode::CREATED,
            Self::Strict => match err {
                AccountError::AlreadyExists => StatusCode::CONFLICT,
                AccountError::NotFound => StatusCode::NOT_FOUND,
                AccountError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AccountError::PasswordMismatch | AccountError::PasswordTooLong => {
                    StatusCode::BAD_REQUEST
                }
                AccountError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Legacy signup echoes the stored record, hash included.
    pub fn exposes_password_hash(self) -> bool {
        self == Self::Legacy
    }
}
