use std::collections::HashSet;

use thiserror::Error;

use crate::model::activity::Activity;
use crate::model::ids::{ActivityId, CourseId, ModuleId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("activity {activity} appears more than once in course {course}")]
    DuplicateActivity {
        course: CourseId,
        activity: ActivityId,
    },

    #[error("activity {activity} is declared under module {expected} but belongs to {actual}")]
    ModuleMismatch {
        activity: ActivityId,
        expected: ModuleId,
        actual: ModuleId,
    },

    #[error("activity {activity} belongs to course {actual}, not {expected}")]
    CourseMismatch {
        activity: ActivityId,
        expected: CourseId,
        actual: CourseId,
    },
}

/// A module and the activities it contains.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleOutline {
    id: ModuleId,
    activities: Vec<Activity>,
}

impl ModuleOutline {
    #[must_use]
    pub fn new(id: ModuleId, activities: Vec<Activity>) -> Self {
        Self { id, activities }
    }

    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    #[must_use]
    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }
}

/// The shape of a course as far as progress aggregation cares: which
/// activities exist, grouped by module.
///
/// Course-level totals are always taken over every activity listed here,
/// attempted or not.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseOutline {
    id: CourseId,
    modules: Vec<ModuleOutline>,
}

impl CourseOutline {
    /// # Errors
    ///
    /// Returns `CourseError` if an activity is listed twice or its own
    /// module/course ids disagree with where it is listed.
    pub fn new(id: CourseId, modules: Vec<ModuleOutline>) -> Result<Self, CourseError> {
        let mut seen = HashSet::new();
        for module in &modules {
            for activity in module.activities() {
                if activity.course_id() != id {
                    return Err(CourseError::CourseMismatch {
                        activity: activity.id(),
                        expected: id,
                        actual: activity.course_id(),
                    });
                }
                if activity.module_id() != module.id() {
                    return Err(CourseError::ModuleMismatch {
                        activity: activity.id(),
                        expected: module.id(),
                        actual: activity.module_id(),
                    });
                }
                if !seen.insert(activity.id()) {
                    return Err(CourseError::DuplicateActivity {
                        course: id,
                        activity: activity.id(),
                    });
                }
            }
        }
        Ok(Self { id, modules })
    }

    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn modules(&self) -> &[ModuleOutline] {
        &self.modules
    }

    pub fn activities(&self) -> impl Iterator<Item = &Activity> {
        self.modules.iter().flat_map(|m| m.activities.iter())
    }

    #[must_use]
    pub fn total_activities(&self) -> usize {
        self.modules.iter().map(|m| m.activities.len()).sum()
    }

    #[must_use]
    pub fn find_activity(&self, id: ActivityId) -> Option<&Activity> {
        self.activities().find(|a| a.id() == id)
    }
}
