use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{self, IgnoredAny};
use serde::ser;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;
use thiserror::Error;

use crate::model::course::CourseOutline;
use crate::model::ids::{ActivityId, CourseId, EnrolleeId};
use crate::normalizer::{CanonicalResult, round_hundredths};

//
// ─── STATE BLOB ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StateBlobError {
    #[error("state blob is not valid JSON: {0}")]
    InvalidJson(String),
}

/// Content-defined state, stored and returned byte-for-byte.
///
/// The blob is kept as its serialized JSON text; nothing in this crate looks
/// inside it.
#[derive(Clone, PartialEq, Eq)]
pub struct StateBlob(String);

impl StateBlob {
    /// Wrap already-serialized JSON text.
    ///
    /// # Errors
    ///
    /// Returns `StateBlobError::InvalidJson` if `raw` is not a JSON document.
    pub fn from_raw(raw: impl Into<String>) -> Result<Self, StateBlobError> {
        let raw = raw.into();
        serde_json::from_str::<IgnoredAny>(&raw)
            .map_err(|e| StateBlobError::InvalidJson(e.to_string()))?;
        Ok(Self(raw))
    }

    /// Serialize a JSON value into a blob.
    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Self {
        Self(value.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// The blob as an embeddable raw JSON value.
    ///
    /// # Errors
    ///
    /// Returns `StateBlobError::InvalidJson` if the stored text is not JSON.
    pub fn to_raw_value(&self) -> Result<Box<RawValue>, StateBlobError> {
        RawValue::from_string(self.0.clone())
            .map_err(|e| StateBlobError::InvalidJson(e.to_string()))
    }
}

impl fmt::Debug for StateBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateBlob({} bytes)", self.0.len())
    }
}

impl Serialize for StateBlob {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_raw_value()
            .map_err(ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StateBlob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        StateBlob::from_raw(raw.get()).map_err(de::Error::custom)
    }
}

//
// ─── ACTIVITY PROGRESS ─────────────────────────────────────────────────────────
//

/// Durable, resumable progress for one (enrollee, activity) pair.
///
/// Score fields only ever move upwards: `merge` keeps the best value seen for
/// each of score, completion, success and progress independently. The state
/// blob is replaced wholesale by `store_state`.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityProgress {
    enrollee_id: EnrolleeId,
    activity_id: ActivityId,
    state: Option<StateBlob>,
    score: Option<f64>,
    completed: bool,
    success: bool,
    progress_percent: f64,
    attempts: u32,
    last_accessed: Option<DateTime<Utc>>,
}

impl ActivityProgress {
    /// A fresh record for a pair that has never reported.
    #[must_use]
    pub fn new(enrollee_id: EnrolleeId, activity_id: ActivityId) -> Self {
        Self {
            enrollee_id,
            activity_id,
            state: None,
            score: None,
            completed: false,
            success: false,
            progress_percent: 0.0,
            attempts: 0,
            last_accessed: None,
        }
    }

    /// Rehydrate a record from storage.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_persisted(
        enrollee_id: EnrolleeId,
        activity_id: ActivityId,
        state: Option<StateBlob>,
        score: Option<f64>,
        completed: bool,
        success: bool,
        progress_percent: f64,
        attempts: u32,
        last_accessed: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            enrollee_id,
            activity_id,
            state,
            score,
            completed,
            success,
            progress_percent,
            attempts,
            last_accessed,
        }
    }

    /// Fold a canonical result in with the monotonic-max policy.
    pub fn merge(&mut self, result: &CanonicalResult, at: DateTime<Utc>) {
        self.score = Some(self.score.map_or(result.score, |prev| prev.max(result.score)));
        self.completed |= result.completed;
        self.success |= result.success;
        self.progress_percent = self.progress_percent.max(result.progress_percent);
        self.attempts = self.attempts.saturating_add(1);
        self.last_accessed = Some(at);
    }

    /// Replace the stored state blob.
    pub fn store_state(&mut self, state: StateBlob, at: DateTime<Utc>) {
        self.state = Some(state);
        self.last_accessed = Some(at);
    }

    // Accessors
    #[must_use]
    pub fn enrollee_id(&self) -> EnrolleeId {
        self.enrollee_id
    }

    #[must_use]
    pub fn activity_id(&self) -> ActivityId {
        self.activity_id
    }

    #[must_use]
    pub fn state(&self) -> Option<&StateBlob> {
        self.state.as_ref()
    }

    /// Best score so far as a percentage, `None` if never reported.
    #[must_use]
    pub fn score(&self) -> Option<f64> {
        self.score
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }

    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        self.progress_percent
    }

    /// Number of reports applied to this record.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn last_accessed(&self) -> Option<DateTime<Utc>> {
        self.last_accessed
    }
}

//
// ─── COURSE PROGRESS ───────────────────────────────────────────────────────────
//

/// Rolled-up progress for one enrollee in one course. Always derived from
/// the full set of `ActivityProgress` rows, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseProgress {
    pub course_id: CourseId,
    pub total_activities: usize,
    /// Number of activities whose completion flag is set.
    pub modules_completed: usize,
    /// `100 * modules_completed / total_activities`.
    pub overall_progress: f64,
    /// Mean score over every activity in the course; unattempted counts as 0.
    pub overall_score: f64,
}

impl CourseProgress {
    /// Recompute course totals from scratch.
    ///
    /// Rows for activities outside `outline` are ignored.
    #[must_use]
    pub fn compute(outline: &CourseOutline, rows: &[ActivityProgress]) -> Self {
        let by_activity: HashMap<ActivityId, &ActivityProgress> =
            rows.iter().map(|row| (row.activity_id(), row)).collect();

        let total = outline.total_activities();
        let mut completed = 0_usize;
        let mut score_sum = 0.0_f64;

        for activity in outline.activities() {
            if let Some(row) = by_activity.get(&activity.id()) {
                if row.is_complete() {
                    completed += 1;
                }
                score_sum += row.score().unwrap_or(0.0);
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let (overall_progress, overall_score) = if total == 0 {
            (0.0, 0.0)
        } else {
            (
                round_hundredths(100.0 * completed as f64 / total as f64),
                round_hundredths(score_sum / total as f64),
            )
        };

        Self {
            course_id: outline.id(),
            total_activities: total,
            modules_completed: completed,
            overall_progress,
            overall_score,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Activity, ModuleId, ModuleOutline, SuccessThreshold};
    use crate::time::fixed_now;

    fn result(score: f64, completed: bool, success: bool, progress: f64) -> CanonicalResult {
        CanonicalResult {
            score,
            completed,
            success,
            progress_percent: progress,
        }
    }

    fn outline(activity_count: u64) -> CourseOutline {
        let activities = (1..=activity_count)
            .map(|id| {
                Activity::new(
                    ActivityId::new(id),
                    ModuleId::new(1),
                    CourseId::new(1),
                    SuccessThreshold::default(),
                    Vec::new(),
                )
            })
            .collect();
        CourseOutline::new(
            CourseId::new(1),
            vec![ModuleOutline::new(ModuleId::new(1), activities)],
        )
        .unwrap()
    }

    #[test]
    fn merge_keeps_best_values() {
        let mut progress = ActivityProgress::new(EnrolleeId::new(1), ActivityId::new(1));
        progress.merge(&result(60.0, false, false, 60.0), fixed_now());
        progress.merge(&result(40.0, false, false, 40.0), fixed_now());

        assert_eq!(progress.score(), Some(60.0));
        assert_eq!(progress.progress_percent(), 60.0);
        assert_eq!(progress.attempts(), 2);
    }

    #[test]
    fn completion_and_success_are_sticky() {
        let mut progress = ActivityProgress::new(EnrolleeId::new(1), ActivityId::new(1));
        progress.merge(&result(100.0, true, true, 100.0), fixed_now());
        progress.merge(&result(10.0, false, false, 20.0), fixed_now());

        assert!(progress.is_complete());
        assert!(progress.is_success());
        assert_eq!(progress.score(), Some(100.0));
    }

    #[test]
    fn course_progress_counts_unattempted_as_zero() {
        let outline = outline(4);
        let mut done = ActivityProgress::new(EnrolleeId::new(1), ActivityId::new(1));
        done.merge(&result(100.0, true, true, 100.0), fixed_now());
        let mut half = ActivityProgress::new(EnrolleeId::new(1), ActivityId::new(2));
        half.merge(&result(50.0, false, false, 50.0), fixed_now());
        let untouched = ActivityProgress::new(EnrolleeId::new(1), ActivityId::new(3));

        let course = CourseProgress::compute(&outline, &[done, half, untouched]);
        assert_eq!(course.total_activities, 4);
        assert_eq!(course.modules_completed, 1);
        assert_eq!(course.overall_progress, 25.0);
        assert_eq!(course.overall_score, 37.5);
    }

    #[test]
    fn course_progress_ignores_foreign_rows_and_empty_courses() {
        let mut stray = ActivityProgress::new(EnrolleeId::new(1), ActivityId::new(99));
        stray.merge(&result(100.0, true, true, 100.0), fixed_now());

        let course = CourseProgress::compute(&outline(2), std::slice::from_ref(&stray));
        assert_eq!(course.modules_completed, 0);
        assert_eq!(course.overall_score, 0.0);

        let empty = CourseProgress::compute(&outline(0), &[stray]);
        assert_eq!(empty.overall_progress, 0.0);
        assert_eq!(empty.total_activities, 0);
    }

    #[test]
    fn state_blob_keeps_bytes() {
        let raw = r#"{"b": 1,  "a": [true, null]}"#;
        let blob = StateBlob::from_raw(raw).unwrap();
        assert_eq!(blob.as_str(), raw);

        let encoded = serde_json::to_string(&blob).unwrap();
        assert_eq!(encoded, raw);
    }

    #[test]
    fn state_blob_rejects_non_json() {
        assert!(StateBlob::from_raw("{not json").is_err());
    }
}
