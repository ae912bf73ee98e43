use axum::Router;

use crate::state::AppState;

mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(handlers::limited_routes(state))
        .merge(handlers::account_routes())
}
