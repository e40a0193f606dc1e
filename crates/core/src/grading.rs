use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{AnswerKey, AttemptError, Mapping, PromptId, Score};

/// Per-prompt correctness for one part plus the aggregate counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeResult {
    outcomes: BTreeMap<PromptId, bool>,
}

impl GradeResult {
    /// Correctness of a single prompt; `None` if the key does not cover it.
    #[must_use]
    pub fn outcome(&self, prompt: PromptId) -> Option<bool> {
        self.outcomes.get(&prompt).copied()
    }

    pub fn outcomes(&self) -> impl Iterator<Item = (PromptId, bool)> + '_ {
        self.outcomes.iter().map(|(p, ok)| (*p, *ok))
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        count_u32(self.outcomes.values().filter(|ok| **ok).count())
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        count_u32(self.outcomes.len())
    }

    /// No prompt was graded (the answer key was empty or missing).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Points for this grade.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::PointsOverflow` for absurd prompt counts.
    pub fn score(&self, points_per_question: u32) -> Result<Score, AttemptError> {
        Score::from_counts(self.correct(), self.total(), points_per_question)
    }
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Compare `mapping` against `key`.
///
/// Every prompt in the key is graded; a prompt missing from the mapping is
/// incorrect. Entries in the mapping that the key does not know are ignored.
/// Pure and infallible.
#[must_use]
pub fn grade(mapping: &Mapping, key: &AnswerKey) -> GradeResult {
    let outcomes = key
        .iter()
        .map(|(prompt, expected)| (prompt, mapping.get(prompt) == Some(expected)))
        .collect();
    GradeResult { outcomes }
}
