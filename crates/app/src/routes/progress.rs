//! Backend progress write and course progress queries.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use bridge_core::model::{ActivityId, ActivityProgress, CourseId, CourseProgress, EnrolleeId};
use bridge_core::protocol::{ProgressUpdateRequest, ProgressUpdateResponse};

use crate::error::ApiError;
use crate::state::AppState;

/// One stored activity row, without its state blob.
#[derive(Debug, Serialize)]
pub struct ActivityProgressView {
    pub activity_id: ActivityId,
    pub score: Option<f64>,
    pub completed: bool,
    pub success: bool,
    pub progress: f64,
    pub attempts: u32,
    pub last_accessed: Option<DateTime<Utc>>,
}

impl From<&ActivityProgress> for ActivityProgressView {
    fn from(row: &ActivityProgress) -> Self {
        Self {
            activity_id: row.activity_id(),
            score: row.score(),
            completed: row.is_complete(),
            success: row.is_success(),
            progress: row.progress_percent(),
            attempts: row.attempts(),
            last_accessed: row.last_accessed(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CourseProgressResponse {
    pub course_progress: CourseProgress,
    pub activities: Vec<ActivityProgressView>,
}

/// POST /{enrollee}/progress
#[instrument(skip(state, request), fields(activity = %request.activity_id))]
async fn record_progress(
    State(state): State<AppState>,
    Path(enrollee): Path<u64>,
    Json(request): Json<ProgressUpdateRequest>,
) -> Result<Json<ProgressUpdateResponse>, ApiError> {
    let response = state
        .progress()
        .record_update(EnrolleeId::new(enrollee), &request)
        .await?;
    Ok(Json(response))
}

/// GET /{enrollee}/courses/{course}/progress
#[instrument(skip(state))]
async fn course_progress(
    State(state): State<AppState>,
    Path((enrollee, course)): Path<(u64, u64)>,
) -> Result<Json<CourseProgressResponse>, ApiError> {
    let report = state
        .progress()
        .course_report(EnrolleeId::new(enrollee), CourseId::new(course))
        .await?;
    Ok(Json(CourseProgressResponse {
        course_progress: report.course,
        activities: report.activities.iter().map(ActivityProgressView::from).collect(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{enrollee}/progress", post(record_progress))
        .route("/{enrollee}/courses/{course}/progress", get(course_progress))
}
