use exam_core::model::{Attempt, AttemptScope, UserId};

use super::{
    SqliteRepository,
    mapping::{id_i64, map_attempt_row, map_attempt_row_with_id},
};
use crate::repository::{
    AttemptId, AttemptRepository, AttemptRow, StorageError, keep_latest_per_group,
};

const SELECT_ATTEMPTS: &str = r"
    SELECT
        id, user_id, exercise_id, part_id, theme_id,
        correct_count, total_count, obtained, possible, created_at
    FROM attempts
";

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn append_attempt(&self, attempt: &Attempt) -> Result<AttemptId, StorageError> {
        let exercise_id = id_i64("exercise_id", attempt.exercise_id().value())?;
        let part_id = id_i64("part_id", attempt.part_id().value())?;
        let theme_id = attempt
            .theme_id()
            .map(|t| id_i64("theme_id", t.value()))
            .transpose()?;

        let res = sqlx::query(
            r"
                INSERT INTO attempts (
                    user_id, exercise_id, part_id, theme_id,
                    correct_count, total_count, obtained, possible, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(attempt.user_id().to_string())
        .bind(exercise_id)
        .bind(part_id)
        .bind(theme_id)
        .bind(i64::from(attempt.correct_count()))
        .bind(i64::from(attempt.total_count()))
        .bind(i64::from(attempt.obtained()))
        .bind(i64::from(attempt.possible()))
        .bind(attempt.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let id = res.last_insert_rowid();
        tracing::debug!(id, user = %attempt.user_id(), "attempt appended");
        Ok(id)
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<Attempt, StorageError> {
        let sql = format!("{SELECT_ATTEMPTS} WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .ok_or(StorageError::NotFound)?;

        map_attempt_row(&row)
    }

    async fn list_attempts(
        &self,
        user_id: UserId,
        scope: AttemptScope,
    ) -> Result<Vec<AttemptRow>, StorageError> {
        let mut sql = String::from(SELECT_ATTEMPTS);
        sql.push_str(" WHERE user_id = ?1");
        match scope {
            AttemptScope::Practice => sql.push_str(" AND theme_id IS NULL"),
            AttemptScope::Theme(_) => sql.push_str(" AND theme_id = ?2"),
            AttemptScope::AllThemes => sql.push_str(" AND theme_id IS NOT NULL"),
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let mut query = sqlx::query(&sql).bind(user_id.to_string());
        if let AttemptScope::Theme(theme_id) = scope {
            query = query.bind(id_i64("theme_id", theme_id.value())?);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_attempt_row_with_id(&row)?);
        }
        Ok(out)
    }

    async fn list_latest_attempts(
        &self,
        user_id: UserId,
        scope: AttemptScope,
    ) -> Result<Vec<AttemptRow>, StorageError> {
        let rows = self.list_attempts(user_id, scope).await?;
        let latest = keep_latest_per_group(rows, scope);
        tracing::debug!(user = %user_id, ?scope, count = latest.len(), "latest attempts");
        Ok(latest)
    }
}
