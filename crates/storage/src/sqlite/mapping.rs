use exam_core::model::{Attempt, ExerciseId, PartId, ThemeId, UserId};
use sqlx::Row;

use crate::repository::{AttemptRow, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn user_id_from_text(raw: &str) -> Result<UserId, StorageError> {
    raw.parse::<UserId>()
        .map_err(|_| StorageError::Serialization(format!("invalid user_id: {raw}")))
}

pub(crate) fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<Attempt, StorageError> {
    let user_id = user_id_from_text(&row.try_get::<String, _>("user_id").map_err(ser)?)?;
    let exercise_id = ExerciseId::new(i64_to_u64(
        "exercise_id",
        row.try_get::<i64, _>("exercise_id").map_err(ser)?,
    )?);
    let part_id = PartId::new(i64_to_u64(
        "part_id",
        row.try_get::<i64, _>("part_id").map_err(ser)?,
    )?);
    let theme_id = row
        .try_get::<Option<i64>, _>("theme_id")
        .map_err(ser)?
        .map(|v| i64_to_u64("theme_id", v).map(ThemeId::new))
        .transpose()?;

    let correct = u32_from_i64(
        "correct_count",
        row.try_get::<i64, _>("correct_count").map_err(ser)?,
    )?;
    let total = u32_from_i64(
        "total_count",
        row.try_get::<i64, _>("total_count").map_err(ser)?,
    )?;
    let obtained = u32_from_i64("obtained", row.try_get::<i64, _>("obtained").map_err(ser)?)?;
    let possible = u32_from_i64("possible", row.try_get::<i64, _>("possible").map_err(ser)?)?;
    let created_at = row.try_get("created_at").map_err(ser)?;

    Attempt::from_persisted(
        user_id,
        exercise_id,
        part_id,
        theme_id,
        correct,
        total,
        obtained,
        possible,
        created_at,
    )
    .map_err(ser)
}

pub(crate) fn map_attempt_row_with_id(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<AttemptRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    Ok(AttemptRow::new(id, map_attempt_row(row)?))
}
