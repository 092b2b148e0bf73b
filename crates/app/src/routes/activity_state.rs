//! Read access to the stored state blob.

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Router;
use axum::routing::get;
use tracing::instrument;

use bridge_core::model::{ActivityId, EnrolleeId};

use crate::error::ApiError;
use crate::state::AppState;

/// GET /{enrollee}/activities/{activity}/state
///
/// The blob is returned byte-for-byte; `204` when nothing has been saved.
#[instrument(skip(state))]
async fn load_state(
    State(state): State<AppState>,
    Path((enrollee, activity)): Path<(u64, u64)>,
) -> Result<Response, ApiError> {
    let progress = state.progress();
    let activity = progress.activity(ActivityId::new(activity)).await?;

    let response = match progress
        .load_state(EnrolleeId::new(enrollee), activity.id())
        .await?
    {
        Some(blob) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            blob.into_inner(),
        )
            .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    };
    Ok(response)
}

pub fn router() -> Router<AppState> {
    Router::new().route("/{enrollee}/activities/{activity}/state", get(load_state))
}
