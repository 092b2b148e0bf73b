use serde::{Deserialize, Serialize};

use crate::model::{ActivityId, ActivityProgress, CourseProgress, StateBlob};

/// Body of the backend progress write.
///
/// `score` and `progress` are percentages; `response` is the content's state
/// blob, persisted untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdateRequest {
    pub activity_id: ActivityId,
    #[serde(default)]
    pub completion: bool,
    pub score: f64,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<StateBlob>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleProgressView {
    pub progress: f64,
    pub score: f64,
    pub is_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseProgressView {
    pub overall_progress: f64,
    pub overall_score: f64,
    pub modules_completed: usize,
}

/// Reply to a backend progress write: the activity as now stored and the
/// freshly recomputed course totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdateResponse {
    pub module_progress: ModuleProgressView,
    pub course_progress: CourseProgressView,
}

impl ProgressUpdateResponse {
    #[must_use]
    pub fn new(activity: &ActivityProgress, course: &CourseProgress) -> Self {
        Self {
            module_progress: ModuleProgressView {
                progress: activity.progress_percent(),
                score: activity.score().unwrap_or(0.0),
                is_complete: activity.is_complete(),
            },
            course_progress: CourseProgressView {
                overall_progress: course.overall_progress,
                overall_score: course.overall_score,
                modules_completed: course.modules_completed,
            },
        }
    }
}
