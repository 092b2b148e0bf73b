use bridge_core::model::{
    Activity, ActivityId, ActivityProgress, CourseId, EnrolleeId, ModuleId, StateBlob,
    SuccessThreshold,
};
use bridge_core::origin::Origin;
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn origins_to_json(origins: &[Origin]) -> Result<String, StorageError> {
    serde_json::to_string(origins).map_err(ser)
}

fn origins_from_json(raw: &str) -> Result<Vec<Origin>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

/// Maps a row with `id, module_id, course_id, success_threshold, allowed_origins`.
pub(crate) fn map_activity_row(row: &sqlx::sqlite::SqliteRow) -> Result<Activity, StorageError> {
    let threshold: f64 = row.try_get("success_threshold").map_err(ser)?;
    let origins: String = row.try_get("allowed_origins").map_err(ser)?;

    Ok(Activity::new(
        ActivityId::new(i64_to_u64("id", row.try_get("id").map_err(ser)?)?),
        ModuleId::new(i64_to_u64("module_id", row.try_get("module_id").map_err(ser)?)?),
        CourseId::new(i64_to_u64("course_id", row.try_get("course_id").map_err(ser)?)?),
        SuccessThreshold::new(threshold).map_err(ser)?,
        origins_from_json(&origins)?,
    ))
}

pub(crate) fn map_progress_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ActivityProgress, StorageError> {
    let state = row
        .try_get::<Option<String>, _>("state_json")
        .map_err(ser)?
        .map(StateBlob::from_raw)
        .transpose()
        .map_err(ser)?;

    let attempts_i64: i64 = row.try_get("attempts").map_err(ser)?;
    let attempts = u32::try_from(attempts_i64)
        .map_err(|_| StorageError::Serialization(format!("invalid attempts: {attempts_i64}")))?;

    Ok(ActivityProgress::from_persisted(
        EnrolleeId::new(i64_to_u64(
            "enrollee_id",
            row.try_get("enrollee_id").map_err(ser)?,
        )?),
        ActivityId::new(i64_to_u64(
            "activity_id",
            row.try_get("activity_id").map_err(ser)?,
        )?),
        state,
        row.try_get("score").map_err(ser)?,
        row.try_get("completed").map_err(ser)?,
        row.try_get("success").map_err(ser)?,
        row.try_get("progress_percent").map_err(ser)?,
        attempts,
        row.try_get("last_accessed").map_err(ser)?,
    ))
}
