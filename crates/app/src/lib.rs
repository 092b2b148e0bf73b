#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::Router;

use crate::state::AppState;

/// The full HTTP surface, without transport layers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/enrollees", routes::enrollee_router())
        .with_state(state)
}
