use std::sync::Arc;

use tracing::{debug, info, warn};

use bridge_core::model::{
    Activity, ActivityId, ActivityProgress, CourseId, CourseProgress, EnrolleeId, StateBlob,
};
use bridge_core::normalizer::{CanonicalResult, normalize_percentages};
use bridge_core::protocol::{ProgressUpdateRequest, ProgressUpdateResponse};
use storage::repository::{CatalogRepository, ProgressRepository, StateStore, Storage};

use crate::Clock;
use crate::error::ProgressServiceError;
use crate::grade_sink::{GradeSink, GradeUpdate};

/// A course's totals together with the rows they were computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseReport {
    pub course: CourseProgress,
    pub activities: Vec<ActivityProgress>,
}

/// Progress Aggregator plus the backend write it serves.
///
/// Score fields go through `ProgressRepository::merge_result`; the state blob
/// only ever through `StateStore::save_state`.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    states: Arc<dyn StateStore>,
    progress: Arc<dyn ProgressRepository>,
    catalog: Arc<dyn CatalogRepository>,
    sink: Arc<dyn GradeSink>,
}

impl ProgressService {
    #[must_use]
    pub fn new(clock: Clock, storage: &Storage, sink: Arc<dyn GradeSink>) -> Self {
        Self {
            clock,
            states: Arc::clone(&storage.states),
            progress: Arc::clone(&storage.progress),
            catalog: Arc::clone(&storage.catalog),
            sink,
        }
    }

    /// Look up an activity in the catalog.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::UnknownActivity` if it is not catalogued.
    pub async fn activity(&self, id: ActivityId) -> Result<Activity, ProgressServiceError> {
        self.catalog
            .get_activity(id)
            .await?
            .ok_or(ProgressServiceError::UnknownActivity(id))
    }

    /// Fold `result` into the enrollee's row for `activity` and recompute the
    /// owning course from the committed rows.
    ///
    /// The grade sink is notified afterwards; a sink failure is logged and
    /// does not fail the write.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` if the merge or the recompute fails.
    pub async fn apply(
        &self,
        enrollee: EnrolleeId,
        activity: &Activity,
        result: &CanonicalResult,
    ) -> Result<(ActivityProgress, CourseProgress), ProgressServiceError> {
        let row = self
            .progress
            .merge_result(enrollee, activity.id(), result, self.clock.now())
            .await?;
        let course = self.course_progress(enrollee, activity.course_id()).await?;

        info!(
            enrollee = %enrollee,
            activity = %activity.id(),
            score = result.score,
            stored_score = row.score().unwrap_or(0.0),
            completed = row.is_complete(),
            attempts = row.attempts(),
            "progress applied"
        );

        let update = GradeUpdate {
            enrollee_id: enrollee,
            activity_id: activity.id(),
            course: course.clone(),
        };
        if let Err(err) = self.sink.publish(&update).await {
            warn!(
                enrollee = %enrollee,
                course = %course.course_id,
                error = %err,
                "grade sink failed"
            );
        }

        Ok((row, course))
    }

    /// Backend write endpoint: persist the content's state (if sent) and
    /// apply the reported percentages.
    ///
    /// Completion and success are recomputed from the clamped score; the
    /// flags in the request are advisory.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::UnknownActivity` for an uncatalogued
    /// activity, or a storage error if persisting fails.
    pub async fn record_update(
        &self,
        enrollee: EnrolleeId,
        request: &ProgressUpdateRequest,
    ) -> Result<ProgressUpdateResponse, ProgressServiceError> {
        let activity = self.activity(request.activity_id).await?;

        let normalized = normalize_percentages(
            request.score,
            request.progress,
            activity.success_threshold(),
        );
        for warning in &normalized.warnings {
            warn!(
                enrollee = %enrollee,
                activity = %activity.id(),
                %warning,
                "malformed progress write"
            );
        }
        if request.completion != normalized.result.completed
            || request.success != normalized.result.success
        {
            debug!(
                enrollee = %enrollee,
                activity = %activity.id(),
                "request flags disagree with score, using derived flags"
            );
        }

        self.record_report(
            enrollee,
            &activity,
            &normalized.result,
            request.response.as_ref(),
        )
        .await
    }

    /// Persist an already normalized report: the state blob first, then the
    /// score fields.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` if either write or the recompute fails.
    pub async fn record_report(
        &self,
        enrollee: EnrolleeId,
        activity: &Activity,
        result: &CanonicalResult,
        state: Option<&StateBlob>,
    ) -> Result<ProgressUpdateResponse, ProgressServiceError> {
        if let Some(state) = state {
            self.save_state(enrollee, activity.id(), state).await?;
        }

        let (row, course) = self.apply(enrollee, activity, result).await?;
        Ok(ProgressUpdateResponse::new(&row, &course))
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError` if the blob cannot be stored.
    pub async fn save_state(
        &self,
        enrollee: EnrolleeId,
        activity: ActivityId,
        state: &StateBlob,
    ) -> Result<(), ProgressServiceError> {
        self.states
            .save_state(enrollee, activity, state, self.clock.now())
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError` if the state cannot be read.
    pub async fn load_state(
        &self,
        enrollee: EnrolleeId,
        activity: ActivityId,
    ) -> Result<Option<StateBlob>, ProgressServiceError> {
        Ok(self.states.load_state(enrollee, activity).await?)
    }

    /// Recompute course totals from every row the enrollee has.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::UnknownCourse` if the course is not
    /// catalogued.
    pub async fn course_progress(
        &self,
        enrollee: EnrolleeId,
        course: CourseId,
    ) -> Result<CourseProgress, ProgressServiceError> {
        Ok(self.course_report(enrollee, course).await?.course)
    }

    /// Course totals plus the per-activity rows behind them.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::UnknownCourse` if the course is not
    /// catalogued.
    pub async fn course_report(
        &self,
        enrollee: EnrolleeId,
        course: CourseId,
    ) -> Result<CourseReport, ProgressServiceError> {
        let outline = self
            .catalog
            .get_course(course)
            .await?
            .ok_or(ProgressServiceError::UnknownCourse(course))?;
        let activities = self.progress.list_progress(enrollee, course).await?;
        Ok(CourseReport {
            course: CourseProgress::compute(&outline, &activities),
            activities,
        })
    }
}
