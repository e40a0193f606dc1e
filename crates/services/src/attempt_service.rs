use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

use exam_core::model::{AttemptScope, ExerciseId, PartId, Score, ThemeId, UserId};
use storage::repository::{AttemptId, AttemptRepository, AttemptRow, InMemoryRepository};

use crate::error::AttemptServiceError;

/// Presentation-agnostic list item for a persisted attempt.
///
/// No pre-formatted strings; the caller formats timestamps and scores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptListItem {
    pub id: AttemptId,
    pub exercise_id: ExerciseId,
    pub part_id: PartId,
    pub theme_id: Option<ThemeId>,
    pub correct: u32,
    pub total: u32,
    pub score: Score,
    pub created_at: DateTime<Utc>,
}

impl AttemptListItem {
    #[must_use]
    pub fn from_row(row: &AttemptRow) -> Self {
        let attempt = &row.attempt;
        Self {
            id: row.id,
            exercise_id: attempt.exercise_id(),
            part_id: attempt.part_id(),
            theme_id: attempt.theme_id(),
            correct: attempt.correct_count(),
            total: attempt.total_count(),
            score: attempt.score(),
            created_at: attempt.created_at(),
        }
    }
}

/// Read side of attempt history: latest attempts and score totals.
#[derive(Clone)]
pub struct AttemptService {
    attempts: Arc<dyn AttemptRepository>,
}

impl AttemptService {
    #[must_use]
    pub fn new(attempts: Arc<dyn AttemptRepository>) -> Self {
        Self { attempts }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRepository::new()))
    }

    /// Latest standalone-practice attempt per exercise, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AttemptServiceError::Storage` on repository failures.
    pub async fn latest_practice_attempts(
        &self,
        user_id: UserId,
    ) -> Result<Vec<AttemptListItem>, AttemptServiceError> {
        self.latest(user_id, AttemptScope::Practice).await
    }

    /// Latest attempt per part within `theme_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AttemptServiceError::Storage` on repository failures.
    pub async fn latest_theme_attempts(
        &self,
        user_id: UserId,
        theme_id: ThemeId,
    ) -> Result<Vec<AttemptListItem>, AttemptServiceError> {
        self.latest(user_id, AttemptScope::Theme(theme_id)).await
    }

    /// Per theme, the sum of the latest attempt of every part.
    ///
    /// # Errors
    ///
    /// Returns `AttemptServiceError::Storage` on repository failures.
    pub async fn theme_scores(
        &self,
        user_id: UserId,
    ) -> Result<BTreeMap<ThemeId, Score>, AttemptServiceError> {
        let rows = self
            .attempts
            .list_latest_attempts(user_id, AttemptScope::AllThemes)
            .await?;

        let mut totals: BTreeMap<ThemeId, Score> = BTreeMap::new();
        for row in &rows {
            let Some(theme_id) = row.attempt.theme_id() else {
                continue;
            };
            let entry = totals.entry(theme_id).or_default();
            *entry = entry.plus(row.attempt.score());
        }
        Ok(totals)
    }

    /// Score of the latest practice attempt of every exercise.
    ///
    /// # Errors
    ///
    /// Returns `AttemptServiceError::Storage` on repository failures.
    pub async fn practice_scores(
        &self,
        user_id: UserId,
    ) -> Result<BTreeMap<ExerciseId, Score>, AttemptServiceError> {
        let rows = self
            .attempts
            .list_latest_attempts(user_id, AttemptScope::Practice)
            .await?;
        Ok(rows
            .iter()
            .map(|row| (row.attempt.exercise_id(), row.attempt.score()))
            .collect())
    }

    async fn latest(
        &self,
        user_id: UserId,
        scope: AttemptScope,
    ) -> Result<Vec<AttemptListItem>, AttemptServiceError> {
        let rows = self.attempts.list_latest_attempts(user_id, scope).await?;
        Ok(rows.iter().map(AttemptListItem::from_row).collect())
    }
}
