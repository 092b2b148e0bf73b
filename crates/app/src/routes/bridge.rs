//! Relay for cross-frame messages posted by the hosting page.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tracing::instrument;

use bridge_core::model::{ActivityId, EnrolleeId};
use bridge_core::protocol::InboundFrame;

use crate::error::ApiError;
use crate::state::AppState;

/// POST /{enrollee}/activities/{activity}/messages
///
/// Replies with the message to post back into the frame, or `204` when the
/// bridge stays silent.
#[instrument(skip(state, frame), fields(origin = %frame.origin))]
async fn relay_message(
    State(state): State<AppState>,
    Path((enrollee, activity)): Path<(u64, u64)>,
    Json(frame): Json<InboundFrame>,
) -> Result<Response, ApiError> {
    let session = state
        .services
        .open_session(EnrolleeId::new(enrollee), ActivityId::new(activity))
        .await?;
    let outcome = session.handle(&frame).await;

    Ok(match outcome.reply {
        Some(reply) => Json(reply).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/{enrollee}/activities/{activity}/messages", post(relay_message))
}
