use axum::{
    extract::{
        multipart::MultipartError, rejection::JsonRejection, DefaultBodyLimit, FromRef,
        Multipart, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, instrument, warn};

use super::{
    dto::{ChangePasswordRequest, LoginRequest, MessageResponse, SignupRequest, UserView},
    errors::AccountError,
    jwt::{AuthUser, JwtKeys},
    policy::{Operation, ResponsePolicy},
    repo_types::{NewUser, PublicUser},
    services::{self, PasswordChange},
};
use crate::{state::AppState, storage::UploadedFile};

const MAX_AVATAR_BYTES: usize = 10 * 1024 * 1024;

type Reply = (StatusCode, Json<MessageResponse>);

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/changepassword", post(change_password))
        .route("/logout", post(logout))
        .route("/me", get(get_me))
        .route(
            "/upload",
            post(upload_avatar).layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES)),
        )
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Reply {
    let Json(payload) = match payload {
        Ok(p) => p,
        Err(rej) => return json_rejected(rej),
    };
    let policy = state.config.response_policy;
    let new = NewUser {
        user_name: payload.user_name,
        email: payload.email,
        password: payload.password,
    };
    match services::register(&state, new).await {
        Ok(user) => (
            policy.success(Operation::Signup),
            Json(
                MessageResponse::msg("Registered Successfully!")
                    .with_user(UserView::new(user, policy.exposes_password_hash())),
            ),
        ),
        Err(e) => reject(
            policy,
            Operation::Signup,
            e,
            "Server issues!Failed to create a new account",
        ),
    }
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Reply {
    let Json(payload) = match payload {
        Ok(p) => p,
        Err(rej) => return json_rejected(rej),
    };
    let policy = state.config.response_policy;
    let keys = JwtKeys::from_ref(&state);
    match services::authenticate(&state, &keys, &payload.email, &payload.password).await {
        Ok(logged_in) => (
            policy.success(Operation::Login),
            Json(
                MessageResponse::msg("Logged in successfully")
                    .with_token(logged_in.token)
                    .with_user(UserView::new(logged_in.user, false)),
            ),
        ),
        Err(e) => reject(policy, Operation::Login, e, "server issues!loggin failed"),
    }
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Reply {
    let Json(payload) = match payload {
        Ok(p) => p,
        Err(rej) => return json_rejected(rej),
    };
    let policy = state.config.response_policy;
    let req = PasswordChange {
        email: &payload.email,
        current_password: &payload.current_password,
        new_password: &payload.new_password,
        confirm_password: &payload.confirm_password,
    };
    match services::change_password(&state, req).await {
        Ok(user) => (
            policy.success(Operation::ChangePassword),
            Json(
                MessageResponse::msg("Password changed successfully!")
                    .with_user(UserView::new(user, policy.exposes_password_hash())),
            ),
        ),
        Err(e) => reject(
            policy,
            Operation::ChangePassword,
            e,
            "Server issues!Failed to change password",
        ),
    }
}

/// Multipart form with an `email` text field and a `file` part.
#[instrument(skip(state, mp))]
pub async fn upload_avatar(State(state): State<AppState>, mut mp: Multipart) -> Reply {
    let policy = state.config.response_policy;
    let mut email: Option<String> = None;
    let mut file: Option<UploadedFile> = None;

    loop {
        let field = match mp.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return multipart_rejected(e),
        };
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("email") => match field.text().await {
                Ok(text) => email = Some(text),
                Err(e) => return multipart_rejected(e),
            },
            Some("file") => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".into());
                match field.bytes().await {
                    Ok(body) => {
                        file = Some(UploadedFile {
                            file_name,
                            content_type,
                            body,
                        })
                    }
                    Err(e) => return multipart_rejected(e),
                }
            }
            _ => {}
        }
    }

    let Some(file) = file else {
        return bad_request("No file uploaded.");
    };
    let Some(email) = email else {
        return bad_request("Email is required.");
    };

    match services::upload_avatar(&state, &email, file).await {
        Ok(url) => (
            policy.success(Operation::Upload),
            Json(MessageResponse::msg("Avatar uploaded successfully!").with_avatar_url(url)),
        ),
        Err(e) => reject(
            policy,
            Operation::Upload,
            e,
            "Server issues!Failed to upload avatar",
        ),
    }
}

/// Tokens are not tracked server-side; the client just drops its copy.
#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> Reply {
    (
        state.config.response_policy.success(Operation::Logout),
        Json(MessageResponse::msg("LoggedOut Successfully!")),
    )
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    match services::find_user(&state, user_id).await {
        Ok(user) => Ok(Json(user.into())),
        Err(AccountError::Internal(e)) => {
            error!(error = ?e, user_id = %user_id, "load current user failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Server issues!".into()))
        }
        Err(_) => {
            warn!(user_id = %user_id, "token for missing user");
            Err((StatusCode::UNAUTHORIZED, "User not found".into()))
        }
    }
}

fn reject(policy: ResponsePolicy, op: Operation, err: AccountError, internal_msg: &str) -> Reply {
    let status = policy.rejection(op, &err);
    match err {
        AccountError::Internal(e) => {
            error!(error = ?e, operation = ?op, "account operation failed");
            (status, Json(MessageResponse::msg(internal_msg)))
        }
        other => (status, Json(MessageResponse::msg(other.to_string()))),
    }
}

fn json_rejected(rej: JsonRejection) -> Reply {
    warn!(error = %rej, "rejected request body");
    (rej.status(), Json(MessageResponse::msg(rej.body_text())))
}

fn multipart_rejected(e: MultipartError) -> Reply {
    let status = e.status();
    warn!(error = %e, %status, "rejected upload body");
    let msg = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "File is too large."
    } else {
        "Malformed upload body."
    };
    (status, Json(MessageResponse::msg(msg)))
}

fn bad_request(msg: &str) -> Reply {
    (StatusCode::BAD_REQUEST, Json(MessageResponse::msg(msg)))
}
