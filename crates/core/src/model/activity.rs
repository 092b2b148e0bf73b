use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ActivityId, CourseId, ModuleId};
use crate::origin::Origin;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ActivityError {
    #[error("success threshold must be in [0, 1], got {0}")]
    InvalidSuccessThreshold(f64),
}

//
// ─── SUCCESS THRESHOLD ─────────────────────────────────────────────────────────
//

/// Minimum raw score (in `[0, 1]`) at which an attempt counts as a success.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct SuccessThreshold(f64);

impl SuccessThreshold {
    pub const DEFAULT: f64 = 0.70;

    /// # Errors
    ///
    /// Returns `ActivityError::InvalidSuccessThreshold` for values outside
    /// `[0, 1]` or non-finite values.
    pub fn new(value: f64) -> Result<Self, ActivityError> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(ActivityError::InvalidSuccessThreshold(value));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    #[must_use]
    pub fn is_met_by(self, raw_score: f64) -> bool {
        raw_score >= self.0
    }
}

impl Default for SuccessThreshold {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<f64> for SuccessThreshold {
    type Error = ActivityError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SuccessThreshold> for f64 {
    fn from(value: SuccessThreshold) -> Self {
        value.0
    }
}

//
// ─── ACTIVITY ──────────────────────────────────────────────────────────────────
//

/// One embeddable learning unit (quiz, coding exercise, simulation).
///
/// `allowed_origins` lists the content origins permitted to talk to the
/// bridge for this activity. An empty list defers to the deployment's
/// trusted origins.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    id: ActivityId,
    module_id: ModuleId,
    course_id: CourseId,
    success_threshold: SuccessThreshold,
    allowed_origins: Vec<Origin>,
}

impl Activity {
    #[must_use]
    pub fn new(
        id: ActivityId,
        module_id: ModuleId,
        course_id: CourseId,
        success_threshold: SuccessThreshold,
        mut allowed_origins: Vec<Origin>,
    ) -> Self {
        allowed_origins.sort();
        allowed_origins.dedup();
        Self {
            id,
            module_id,
            course_id,
            success_threshold,
            allowed_origins,
        }
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> ActivityId {
        self.id
    }

    #[must_use]
    pub fn module_id(&self) -> ModuleId {
        self.module_id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn success_threshold(&self) -> SuccessThreshold {
        self.success_threshold
    }

    #[must_use]
    pub fn allowed_origins(&self) -> &[Origin] {
        &self.allowed_origins
    }
}
