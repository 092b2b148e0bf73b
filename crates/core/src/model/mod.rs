mod activity;
mod course;
mod ids;
mod progress;

pub use activity::{Activity, ActivityError, SuccessThreshold};
pub use course::{CourseError, CourseOutline, ModuleOutline};
pub use ids::{ActivityId, CourseId, EnrolleeId, ModuleId, ParseIdError};
pub use progress::{ActivityProgress, CourseProgress, StateBlob, StateBlobError};
