use crate::state::AppState;
use axum::Router;

mod dto;
pub mod errors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod policy;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod store;

pub fn router() -> Router<AppState> {
    handlers::account_routes()
}
