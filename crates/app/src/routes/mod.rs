//! HTTP routes, all scoped under one enrollee.

pub mod activity_state;
pub mod bridge;
pub mod health;
pub mod progress;

use axum::Router;

use crate::state::AppState;

/// Routes nested under `/api/enrollees`.
pub fn enrollee_router() -> Router<AppState> {
    Router::new()
        .merge(progress::router())
        .merge(activity_state::router())
        .merge(bridge::router())
}
