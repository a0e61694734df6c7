//! API routes.

pub mod health;
pub mod logs;

use axum::Router;

use crate::state::AppState;

/// Creates the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(logs::routes())
        .with_state(state)
}
