use tracing::{info, warn};
use uuid::Uuid;

use super::errors::AccountError;
use super::jwt::JwtKeys;
use super::password::{fits_bcrypt, verify_password_blocking};
use super::repo;
use super::repo_types::{NewUser, User};
use crate::state::AppState;
use crate::storage::UploadedFile;

#[derive(Debug)]
pub struct LoggedIn {
    pub token: String,
    pub user: User,
}

/// Create an account unless the email is already taken.
pub async fn register(st: &AppState, new: NewUser) -> Result<User, AccountError> {
    if !fits_bcrypt(&new.password) {
        warn!(email = %new.email, "signup password too long");
        return Err(AccountError::PasswordTooLong);
    }
    if st.users.find_by_email(&new.email).await?.is_some() {
        warn!(email = %new.email, "signup for existing email");
        return Err(AccountError::AlreadyExists);
    }
    // a concurrent signup can still win between lookup and insert; the
    // store's uniqueness rule turns that into AlreadyExists as well
    let user = repo::create(st.users.as_ref(), new, st.config.bcrypt_cost).await?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

pub async fn authenticate(
    st: &AppState,
    keys: &JwtKeys,
    email: &str,
    password: &str,
) -> Result<LoggedIn, AccountError> {
    let user = st
        .users
        .find_by_email(email)
        .await?
        .ok_or_else(|| {
            warn!(email = %email, "login unknown email");
            AccountError::NotFound
        })?;

    if !verify_password_blocking(password.to_string(), user.password.clone()).await? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(AccountError::InvalidCredentials);
    }

    let token = keys.sign(user.id, &user.email)?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(LoggedIn { token, user })
}

pub struct PasswordChange<'a> {
    pub email: &'a str,
    pub current_password: &'a str,
    pub new_password: &'a str,
    pub confirm_password: &'a str,
}

pub async fn change_password(st: &AppState, req: PasswordChange<'_>) -> Result<User, AccountError> {
    if req.new_password != req.confirm_password {
        warn!(email = %req.email, "new and confirm password differ");
        return Err(AccountError::PasswordMismatch);
    }
    if !fits_bcrypt(req.new_password) {
        warn!(email = %req.email, "new password too long");
        return Err(AccountError::PasswordTooLong);
    }

    let mut user = st.users.find_by_email(req.email).await?.ok_or_else(|| {
        warn!(email = %req.email, "password change for unknown email");
        AccountError::NotFound
    })?;

    if !verify_password_blocking(req.current_password.to_string(), user.password.clone()).await? {
        warn!(user_id = %user.id, "password change with wrong current password");
        return Err(AccountError::InvalidCredentials);
    }

    user.set_password(req.new_password);
    let user = repo::save(st.users.as_ref(), &mut user, st.config.bcrypt_cost).await?;
    info!(user_id = %user.id, "password changed");
    Ok(user)
}

/// Push the file to the image host, then point the account at it.
///
/// The upload happens before the account lookup, so an unknown email or a
/// failed save leaves the uploaded object behind.
pub async fn upload_avatar(
    st: &AppState,
    email: &str,
    file: UploadedFile,
) -> Result<String, AccountError> {
    let url = st
        .images
        .upload(&st.config.images.avatar_folder, file)
        .await?;

    let mut user = st.users.find_by_email(email).await?.ok_or_else(|| {
        warn!(email = %email, url = %url, "avatar uploaded for unknown email");
        AccountError::NotFound
    })?;

    user.avatar_url = url.clone();
    repo::save(st.users.as_ref(), &mut user, st.config.bcrypt_cost).await?;
    info!(user_id = %user.id, url = %url, "avatar updated");
    Ok(url)
}

pub async fn find_user(st: &AppState, id: Uuid) -> Result<User, AccountError> {
    st.users
        .find_by_id(id)
        .await?
        .ok_or(AccountError::NotFound)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::FromRef;
    use bytes::Bytes;

    use super::*;
    use crate::accounts::password::verify_password;
    use crate::accounts::policy::ResponsePolicy;
    use crate::accounts::repo_types::DEFAULT_AVATAR_URL;
    use crate::accounts::store::LateDuplicateStore;
    use crate::config::AppConfig;
    use crate::storage::FakeImageHost;

    fn new_user(email: &str, password: &str) -> NewUser {
        NewUser {
            user_name: "a".into(),
            email: email.into(),
            password: password.into(),
        }
    }

    fn png() -> UploadedFile {
        UploadedFile {
            file_name: Some("me.png".into()),
            content_type: "image/png".into(),
            body: Bytes::from_static(b"\x89PNG"),
        }
    }

    async fn stored(st: &AppState, email: &str) -> Option<User> {
        st.users.find_by_email(email).await.unwrap()
    }

    #[tokio::test]
    async fn duplicate_signup_keeps_first_password() {
        let st = AppState::fake();
        register(&st, new_user("a@x.com", "pw1")).await.unwrap();

        let err = register(&st, new_user("a@x.com", "pw2")).await.unwrap_err();
        assert!(matches!(err, AccountError::AlreadyExists));

        let user = stored(&st, "a@x.com").await.unwrap();
        assert!(verify_password("pw1", &user.password).unwrap());
        assert!(!verify_password("pw2", &user.password).unwrap());
    }

    #[tokio::test]
    async fn insert_conflict_after_missed_lookup_is_already_exists() {
        let st = AppState::from_parts(
            Arc::new(AppConfig::for_tests(ResponsePolicy::Legacy)),
            Arc::new(LateDuplicateStore),
            Arc::new(FakeImageHost::default()),
        );
        let err = register(&st, new_user("a@x.com", "pw1")).await.unwrap_err();
        assert!(matches!(err, AccountError::AlreadyExists));
        assert_eq!(err.to_string(), "User already exist.");
    }

    #[tokio::test]
    async fn signup_with_over_long_password_stores_nothing() {
        let st = AppState::fake();
        let long = format!("{}correct", "a".repeat(72));
        let err = register(&st, new_user("a@x.com", &long)).await.unwrap_err();
        assert!(matches!(err, AccountError::PasswordTooLong));
        assert!(stored(&st, "a@x.com").await.is_none());
    }

    #[tokio::test]
    async fn login_with_long_password_sharing_prefix_fails() {
        let st = AppState::fake();
        let prefix = "a".repeat(70);
        register(&st, new_user("a@x.com", &format!("{prefix}x"))).await.unwrap();
        let keys = JwtKeys::from_ref(&st);

        let err = authenticate(&st, &keys, "a@x.com", &format!("{prefix}xattacker"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));
        assert!(authenticate(&st, &keys, "a@x.com", &format!("{prefix}x")).await.is_ok());
    }

    #[tokio::test]
    async fn change_to_over_long_password_leaves_hash() {
        let st = AppState::fake();
        register(&st, new_user("a@x.com", "pw1")).await.unwrap();
        let before = stored(&st, "a@x.com").await.unwrap().password;
        let long = "z".repeat(80);

        let err = change_password(
            &st,
            PasswordChange {
                email: "a@x.com",
                current_password: "pw1",
                new_password: &long,
                confirm_password: &long,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AccountError::PasswordTooLong));
        assert_eq!(stored(&st, "a@x.com").await.unwrap().password, before);
    }

    #[tokio::test]
    async fn register_returns_record_with_defaults() {
        let st = AppState::fake();
        let user = register(&st, new_user("a@x.com", "pw1")).await.unwrap();
        assert_eq!(user.user_name, "a");
        assert_eq!(user.avatar_url, DEFAULT_AVATAR_URL);
        assert_ne!(user.password, "pw1");
    }

    #[tokio::test]
    async fn login_issues_token_for_the_user() {
        let st = AppState::fake();
        let created = register(&st, new_user("a@x.com", "pw1")).await.unwrap();
        let keys = JwtKeys::from_ref(&st);

        let logged_in = authenticate(&st, &keys, "a@x.com", "pw1").await.unwrap();
        let claims = keys.verify(&logged_in.token).unwrap();
        assert_eq!(claims.id, created.id);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(logged_in.user.id, created.id);
    }

    #[tokio::test]
    async fn login_unknown_email_is_not_found() {
        let st = AppState::fake();
        let keys = JwtKeys::from_ref(&st);
        let err = authenticate(&st, &keys, "nobody@x.com", "pw").await.unwrap_err();
        assert!(matches!(err, AccountError::NotFound));
    }

    #[tokio::test]
    async fn repeated_bad_logins_get_the_same_answer() {
        let st = AppState::fake();
        register(&st, new_user("a@x.com", "pw1")).await.unwrap();
        let keys = JwtKeys::from_ref(&st);

        for _ in 0..3 {
            let err = authenticate(&st, &keys, "a@x.com", "nope").await.unwrap_err();
            assert!(matches!(err, AccountError::InvalidCredentials));
            assert_eq!(err.to_string(), "Invalid email or password.");
        }
        // no lockout
        assert!(authenticate(&st, &keys, "a@x.com", "pw1").await.is_ok());
    }

    #[tokio::test]
    async fn change_password_mismatch_leaves_hash() {
        let st = AppState::fake();
        register(&st, new_user("a@x.com", "pw1")).await.unwrap();
        let before = stored(&st, "a@x.com").await.unwrap().password;

        let err = change_password(
            &st,
            PasswordChange {
                email: "a@x.com",
                current_password: "pw1",
                new_password: "pw2",
                confirm_password: "pw3",
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AccountError::PasswordMismatch));
        assert_eq!(stored(&st, "a@x.com").await.unwrap().password, before);
    }

    #[tokio::test]
    async fn change_password_wrong_current_leaves_hash() {
        let st = AppState::fake();
        register(&st, new_user("a@x.com", "pw1")).await.unwrap();
        let before = stored(&st, "a@x.com").await.unwrap().password;

        let err = change_password(
            &st,
            PasswordChange {
                email: "a@x.com",
                current_password: "wrong",
                new_password: "pw2",
                confirm_password: "pw2",
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));
        assert_eq!(stored(&st, "a@x.com").await.unwrap().password, before);
    }

    #[tokio::test]
    async fn change_password_unknown_email_is_not_found() {
        let st = AppState::fake();
        let err = change_password(
            &st,
            PasswordChange {
                email: "nobody@x.com",
                current_password: "pw1",
                new_password: "pw2",
                confirm_password: "pw2",
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AccountError::NotFound));
    }

    #[tokio::test]
    async fn change_password_swaps_which_password_verifies() {
        let st = AppState::fake();
        register(&st, new_user("a@x.com", "pw1")).await.unwrap();

        let updated = change_password(
            &st,
            PasswordChange {
                email: "a@x.com",
                current_password: "pw1",
                new_password: "pw2",
                confirm_password: "pw2",
            },
        )
        .await
        .unwrap();
        assert_ne!(updated.password, "pw2");

        let user = stored(&st, "a@x.com").await.unwrap();
        assert!(verify_password("pw2", &user.password).unwrap());
        assert!(!verify_password("pw1", &user.password).unwrap());

        let keys = JwtKeys::from_ref(&st);
        assert!(authenticate(&st, &keys, "a@x.com", "pw2").await.is_ok());
    }

    #[tokio::test]
    async fn upload_sets_avatar_url() {
        let host = Arc::new(FakeImageHost::default());
        let st = AppState::fake_with(ResponsePolicy::Legacy, host.clone());
        register(&st, new_user("a@x.com", "pw1")).await.unwrap();
        let before = stored(&st, "a@x.com").await.unwrap().password;

        let url = upload_avatar(&st, "a@x.com", png()).await.unwrap();
        assert!(url.starts_with("https://fake.local/avatars/"));
        assert_eq!(host.uploads(), vec![url.clone()]);

        let user = stored(&st, "a@x.com").await.unwrap();
        assert_eq!(user.avatar_url, url);
        assert_eq!(user.password, before);
    }

    #[tokio::test]
    async fn upload_for_unknown_email_mutates_nothing() {
        let host = Arc::new(FakeImageHost::default());
        let st = AppState::fake_with(ResponsePolicy::Legacy, host.clone());
        register(&st, new_user("a@x.com", "pw1")).await.unwrap();

        let err = upload_avatar(&st, "nobody@x.com", png()).await.unwrap_err();
        assert!(matches!(err, AccountError::NotFound));
        assert_eq!(
            stored(&st, "a@x.com").await.unwrap().avatar_url,
            DEFAULT_AVATAR_URL
        );
        // the remote object is not cleaned up
        assert_eq!(host.uploads().len(), 1);
    }

    #[tokio::test]
    async fn upload_failure_is_internal() {
        let st = AppState::fake_with(ResponsePolicy::Legacy, Arc::new(FakeImageHost::failing()));
        register(&st, new_user("a@x.com", "pw1")).await.unwrap();
        let err = upload_avatar(&st, "a@x.com", png()).await.unwrap_err();
        assert!(matches!(err, AccountError::Internal(_)));
    }
}
