use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ExerciseId, PartId, ThemeId, UserId};

/// Points awarded per correctly answered prompt.
pub const POINTS_PER_QUESTION: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("correct count ({correct}) exceeds total count ({total})")]
    CorrectExceedsTotal { correct: u32, total: u32 },

    #[error("points overflow for {count} prompts")]
    PointsOverflow { count: u32 },

    #[error("stored points {obtained}/{possible} do not match counts {correct}/{total}")]
    PointsMismatch {
        correct: u32,
        total: u32,
        obtained: u32,
        possible: u32,
    },
}

//
// ─── SCORE ────────────────────────────────────────────────────────────────────
//

/// Obtained vs possible points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub obtained: u32,
    pub possible: u32,
}

impl Score {
    /// Convert counts to points with a fixed `points_per_question`.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::CorrectExceedsTotal` or `AttemptError::PointsOverflow`.
    pub fn from_counts(
        correct: u32,
        total: u32,
        points_per_question: u32,
    ) -> Result<Self, AttemptError> {
        if correct > total {
            return Err(AttemptError::CorrectExceedsTotal { correct, total });
        }
        let possible = total
            .checked_mul(points_per_question)
            .ok_or(AttemptError::PointsOverflow { count: total })?;
        Ok(Self {
            obtained: correct * points_per_question,
            possible,
        })
    }

    /// Add another score; saturates instead of wrapping.
    #[must_use]
    pub fn plus(self, other: Score) -> Self {
        Self {
            obtained: self.obtained.saturating_add(other.obtained),
            possible: self.possible.saturating_add(other.possible),
        }
    }

    #[must_use]
    pub fn is_perfect(&self) -> bool {
        self.possible > 0 && self.obtained == self.possible
    }
}

//
// ─── ATTEMPT ──────────────────────────────────────────────────────────────────
//

/// One graded submission, append-only once persisted.
///
/// `theme_id == None` marks a standalone practice attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    user_id: UserId,
    exercise_id: ExerciseId,
    part_id: PartId,
    theme_id: Option<ThemeId>,
    correct_count: u32,
    total_count: u32,
    score: Score,
    created_at: DateTime<Utc>,
}

impl Attempt {
    /// Build a new attempt, deriving points from the counts.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if the counts are inconsistent.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: UserId,
        exercise_id: ExerciseId,
        part_id: PartId,
        theme_id: Option<ThemeId>,
        correct_count: u32,
        total_count: u32,
        points_per_question: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        let score = Score::from_counts(correct_count, total_count, points_per_question)?;
        Ok(Self {
            user_id,
            exercise_id,
            part_id,
            theme_id,
            correct_count,
            total_count,
            score,
            created_at,
        })
    }

    /// Rehydrate an attempt from persisted storage.
    ///
    /// Points are stored rather than recomputed so a later change of
    /// `points_per_question` does not rewrite history.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if counts or points are inconsistent.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        user_id: UserId,
        exercise_id: ExerciseId,
        part_id: PartId,
        theme_id: Option<ThemeId>,
        correct_count: u32,
        total_count: u32,
        obtained: u32,
        possible: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        if correct_count > total_count {
            return Err(AttemptError::CorrectExceedsTotal {
                correct: correct_count,
                total: total_count,
            });
        }
        if obtained > possible {
            return Err(AttemptError::PointsMismatch {
                correct: correct_count,
                total: total_count,
                obtained,
                possible,
            });
        }
        Ok(Self {
            user_id,
            exercise_id,
            part_id,
            theme_id,
            correct_count,
            total_count,
            score: Score { obtained, possible },
            created_at,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn exercise_id(&self) -> ExerciseId {
        self.exercise_id
    }

    #[must_use]
    pub fn part_id(&self) -> PartId {
        self.part_id
    }

    #[must_use]
    pub fn theme_id(&self) -> Option<ThemeId> {
        self.theme_id
    }

    #[must_use]
    pub fn is_practice(&self) -> bool {
        self.theme_id.is_none()
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn total_count(&self) -> u32 {
        self.total_count
    }

    #[must_use]
    pub fn score(&self) -> Score {
        self.score
    }

    #[must_use]
    pub fn obtained(&self) -> u32 {
        self.score.obtained
    }

    #[must_use]
    pub fn possible(&self) -> u32 {
        self.score.possible
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

//
// ─── QUERY SCOPE ──────────────────────────────────────────────────────────────
//

/// Which attempts a "latest attempts" query looks at, and how it groups them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptScope {
    /// Standalone practice attempts, latest per exercise.
    Practice,
    /// Attempts inside one theme, latest per part.
    Theme(ThemeId),
    /// Attempts inside any theme, latest per (theme, part).
    AllThemes,
}

impl AttemptScope {
    #[must_use]
    pub fn includes(&self, attempt: &Attempt) -> bool {
        match self {
            AttemptScope::Practice => attempt.theme_id.is_none(),
            AttemptScope::Theme(id) => attempt.theme_id == Some(*id),
            AttemptScope::AllThemes => attempt.theme_id.is_some(),
        }
    }

    /// Grouping key used to keep only the newest attempt per group.
    #[must_use]
    pub fn group_key(&self, attempt: &Attempt) -> (u64, u64) {
        match self {
            AttemptScope::Practice => (attempt.exercise_id.value(), 0),
            AttemptScope::Theme(_) => (attempt.part_id.value(), 0),
            AttemptScope::AllThemes => (
                attempt.theme_id.map_or(0, |t| t.value()),
                attempt.part_id.value(),
            ),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn attempt(theme: Option<u64>, correct: u32, total: u32) -> Attempt {
        Attempt::new(
            UserId::random(),
            ExerciseId::new(3),
            PartId::new(1),
            theme.map(ThemeId::new),
            correct,
            total,
            POINTS_PER_QUESTION,
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn score_uses_points_per_question() {
        let score = Score::from_counts(4, 5, POINTS_PER_QUESTION).unwrap();
        assert_eq!(score, Score { obtained: 20, possible: 25 });
    }

    #[test]
    fn correct_above_total_is_rejected() {
        let err = Score::from_counts(6, 5, 5).unwrap_err();
        assert_eq!(err, AttemptError::CorrectExceedsTotal { correct: 6, total: 5 });
    }

    #[test]
    fn attempt_derives_points() {
        let a = attempt(None, 3, 5);
        assert_eq!(a.obtained(), 15);
        assert_eq!(a.possible(), 25);
        assert!(a.is_practice());
    }

    #[test]
    fn persisted_points_are_kept_as_stored() {
        let a = Attempt::from_persisted(
            UserId::random(),
            ExerciseId::new(1),
            PartId::new(2),
            Some(ThemeId::new(9)),
            2,
            5,
            8,
            20,
            fixed_now(),
        )
        .unwrap();
        assert_eq!(a.score(), Score { obtained: 8, possible: 20 });
    }

    #[test]
    fn scope_filters_by_theme() {
        let practice = attempt(None, 1, 5);
        let themed = attempt(Some(4), 1, 5);

        assert!(AttemptScope::Practice.includes(&practice));
        assert!(!AttemptScope::Practice.includes(&themed));
        assert!(AttemptScope::Theme(ThemeId::new(4)).includes(&themed));
        assert!(!AttemptScope::Theme(ThemeId::new(5)).includes(&themed));
        assert!(AttemptScope::AllThemes.includes(&themed));
        assert_eq!(AttemptScope::AllThemes.group_key(&themed), (4, 1));
    }
}
