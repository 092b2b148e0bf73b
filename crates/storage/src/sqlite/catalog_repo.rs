use bridge_core::model::{
    Activity, ActivityId, CourseId, CourseOutline, ModuleId, ModuleOutline,
};
use sqlx::Row;
use tracing::debug;

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_activity_row, origins_to_json, ser};
use crate::repository::{CatalogRepository, StorageError};

#[async_trait::async_trait]
impl CatalogRepository for SqliteRepository {
    async fn upsert_course(&self, outline: &CourseOutline) -> Result<(), StorageError> {
        let course_id = id_to_i64("course_id", outline.id().value())?;
        let module_ids = serde_json::to_string(
            &outline
                .modules()
                .iter()
                .map(|m| m.id().value())
                .collect::<Vec<_>>(),
        )
        .map_err(ser)?;
        let activity_ids = serde_json::to_string(
            &outline.activities().map(|a| a.id().value()).collect::<Vec<_>>(),
        )
        .map_err(ser)?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query("INSERT INTO courses (id) VALUES (?1) ON CONFLICT(id) DO NOTHING")
            .bind(course_id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (module_pos, module) in outline.modules().iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO modules (id, course_id, position)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(id) DO UPDATE SET
                    course_id = excluded.course_id,
                    position = excluded.position
                ",
            )
            .bind(id_to_i64("module_id", module.id().value())?)
            .bind(course_id)
            .bind(i64::try_from(module_pos).map_err(ser)?)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

            for (activity_pos, activity) in module.activities().iter().enumerate() {
                sqlx::query(
                    r"
                    INSERT INTO activities (id, module_id, position, success_threshold, allowed_origins)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(id) DO UPDATE SET
                        module_id = excluded.module_id,
                        position = excluded.position,
                        success_threshold = excluded.success_threshold,
                        allowed_origins = excluded.allowed_origins
                    ",
                )
                .bind(id_to_i64("activity_id", activity.id().value())?)
                .bind(id_to_i64("module_id", module.id().value())?)
                .bind(i64::try_from(activity_pos).map_err(ser)?)
                .bind(activity.success_threshold().value())
                .bind(origins_to_json(activity.allowed_origins())?)
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
            }
        }

        sqlx::query(
            r"
            DELETE FROM activities
            WHERE module_id IN (SELECT id FROM modules WHERE course_id = ?1)
              AND id NOT IN (SELECT value FROM json_each(?2))
            ",
        )
        .bind(course_id)
        .bind(activity_ids)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        sqlx::query(
            r"
            DELETE FROM modules
            WHERE course_id = ?1
              AND id NOT IN (SELECT value FROM json_each(?2))
            ",
        )
        .bind(course_id)
        .bind(module_ids)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        debug!(
            course = %outline.id(),
            activities = outline.total_activities(),
            "course outline stored"
        );
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<CourseOutline>, StorageError> {
        let course_id = id_to_i64("course_id", id.value())?;

        let exists = sqlx::query("SELECT 1 FROM courses WHERE id = ?1")
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        if exists.is_none() {
            return Ok(None);
        }

        let module_rows = sqlx::query(
            "SELECT id FROM modules WHERE course_id = ?1 ORDER BY position ASC, id ASC",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let activity_rows = sqlx::query(
            r"
            SELECT a.id, a.module_id, m.course_id, a.success_threshold, a.allowed_origins
            FROM activities a
            JOIN modules m ON m.id = a.module_id
            WHERE m.course_id = ?1
            ORDER BY m.position ASC, a.position ASC, a.id ASC
            ",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let activities = activity_rows
            .iter()
            .map(map_activity_row)
            .collect::<Result<Vec<Activity>, _>>()?;

        let mut modules = Vec::with_capacity(module_rows.len());
        for row in &module_rows {
            let raw: i64 = row.try_get("id").map_err(ser)?;
            let module_id = ModuleId::new(u64::try_from(raw).map_err(ser)?);
            let members = activities
                .iter()
                .filter(|a| a.module_id() == module_id)
                .cloned()
                .collect();
            modules.push(ModuleOutline::new(module_id, members));
        }

        CourseOutline::new(id, modules).map(Some).map_err(ser)
    }

    async fn get_activity(&self, id: ActivityId) -> Result<Option<Activity>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT a.id, a.module_id, m.course_id, a.success_threshold, a.allowed_origins
            FROM activities a
            JOIN modules m ON m.id = a.module_id
            WHERE a.id = ?1
            ",
        )
        .bind(id_to_i64("activity_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_activity_row).transpose()
    }
}
