use bridge_core::model::{ActivityId, ActivityProgress, CourseId, EnrolleeId};
use bridge_core::normalizer::CanonicalResult;
use chrono::{DateTime, Utc};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_progress_row};
use crate::repository::{ProgressRepository, StorageError};

const PROGRESS_COLUMNS: &str = "p.enrollee_id, p.activity_id, p.state_json, p.score, p.completed, \
     p.success, p.progress_percent, p.attempts, p.last_accessed";

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn merge_result(
        &self,
        enrollee: EnrolleeId,
        activity: ActivityId,
        result: &CanonicalResult,
        at: DateTime<Utc>,
    ) -> Result<ActivityProgress, StorageError> {
        // Single statement: SQLite serializes writers, so the max is computed
        // against the committed row and concurrent merges cannot lose updates.
        let row = sqlx::query(
            r"
            INSERT INTO activity_progress AS p (
                enrollee_id, activity_id, score, completed, success,
                progress_percent, attempts, last_accessed
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)
            ON CONFLICT(enrollee_id, activity_id) DO UPDATE SET
                score = CASE
                    WHEN p.score IS NULL THEN excluded.score
                    ELSE MAX(p.score, excluded.score)
                END,
                completed = MAX(p.completed, excluded.completed),
                success = MAX(p.success, excluded.success),
                progress_percent = MAX(p.progress_percent, excluded.progress_percent),
                attempts = p.attempts + 1,
                last_accessed = excluded.last_accessed
            RETURNING enrollee_id, activity_id, state_json, score, completed, success,
                      progress_percent, attempts, last_accessed
            ",
        )
        .bind(id_to_i64("enrollee_id", enrollee.value())?)
        .bind(id_to_i64("activity_id", activity.value())?)
        .bind(result.score)
        .bind(result.completed)
        .bind(result.success)
        .bind(result.progress_percent)
        .bind(at)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        map_progress_row(&row)
    }

    async fn get_progress(
        &self,
        enrollee: EnrolleeId,
        activity: ActivityId,
    ) -> Result<Option<ActivityProgress>, StorageError> {
        let sql = format!(
            "SELECT {PROGRESS_COLUMNS} FROM activity_progress p \
             WHERE p.enrollee_id = ?1 AND p.activity_id = ?2"
        );
        let row = sqlx::query(&sql)
            .bind(id_to_i64("enrollee_id", enrollee.value())?)
            .bind(id_to_i64("activity_id", activity.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn list_progress(
        &self,
        enrollee: EnrolleeId,
        course: CourseId,
    ) -> Result<Vec<ActivityProgress>, StorageError> {
        let sql = format!(
            "SELECT {PROGRESS_COLUMNS} FROM activity_progress p \
             JOIN activities a ON a.id = p.activity_id \
             JOIN modules m ON m.id = a.module_id \
             WHERE p.enrollee_id = ?1 AND m.course_id = ?2 \
             ORDER BY m.position ASC, a.position ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(id_to_i64("enrollee_id", enrollee.value())?)
            .bind(id_to_i64("course_id", course.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_progress_row).collect()
    }
}
