use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;

use crate::accounts::store::{PgUserStore, UserStore};
use crate::config::AppConfig;
use crate::storage::{ImageHost, S3ImageHost};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub images: Arc<dyn ImageHost>,
}

impl AppState {
    /// Connect to Postgres and the image host described by `config`.
    pub async fn init(config: AppConfig) -> anyhow::Result<(Self, PgPool)> {
        let config = Arc::new(config);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let images = Arc::new(S3ImageHost::new(&config.images).await?) as Arc<dyn ImageHost>;
        let users = Arc::new(PgUserStore::new(db.clone())) as Arc<dyn UserStore>;

        Ok((Self::from_parts(config, users, images), db))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        images: Arc<dyn ImageHost>,
    ) -> Self {
        Self {
            config,
            users,
            images,
        }
    }
}

#[cfg(test)]
impl AppState {
    /// State backed by an in-memory store and a recording image host.
    pub fn fake() -> Self {
        Self::fake_with(
            crate::accounts::policy::ResponsePolicy::Legacy,
            Arc::new(crate::storage::FakeImageHost::default()),
        )
    }

    pub fn fake_with(
        policy: crate::accounts::policy::ResponsePolicy,
        images: Arc<dyn ImageHost>,
    ) -> Self {
        Self::from_parts(
            Arc::new(AppConfig::for_tests(policy)),
            Arc::new(crate::accounts::store::MemoryUserStore::new()),
            images,
        )
    }
}
