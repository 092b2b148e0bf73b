use bridge_core::model::{ActivityId, EnrolleeId, StateBlob};
use chrono::{DateTime, Utc};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, ser};
use crate::repository::{StateStore, StorageError};

#[async_trait::async_trait]
impl StateStore for SqliteRepository {
    async fn load_state(
        &self,
        enrollee: EnrolleeId,
        activity: ActivityId,
    ) -> Result<Option<StateBlob>, StorageError> {
        let raw: Option<Option<String>> = sqlx::query_scalar(
            r"
            SELECT state_json FROM activity_progress
            WHERE enrollee_id = ?1 AND activity_id = ?2
            ",
        )
        .bind(id_to_i64("enrollee_id", enrollee.value())?)
        .bind(id_to_i64("activity_id", activity.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        raw.flatten()
            .map(StateBlob::from_raw)
            .transpose()
            .map_err(ser)
    }

    async fn save_state(
        &self,
        enrollee: EnrolleeId,
        activity: ActivityId,
        state: &StateBlob,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO activity_progress (enrollee_id, activity_id, state_json, last_accessed)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(enrollee_id, activity_id) DO UPDATE SET
                state_json = excluded.state_json,
                last_accessed = excluded.last_accessed
            ",
        )
        .bind(id_to_i64("enrollee_id", enrollee.value())?)
        .bind(id_to_i64("activity_id", activity.value())?)
        .bind(state.as_str())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}
