use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use exam_core::choice::Choices;
use exam_core::completion::Completion;
use exam_core::grading::{GradeResult, grade};
use exam_core::matching::MatchingBoard;
use exam_core::model::{
    Attempt, ExerciseId, Mapping, OptionKey, POINTS_PER_QUESTION, Part, PartId, PartKind,
    PartNumber, PromptId, ThemeId, UserId,
};
use exam_core::time::elapsed;
use storage::repository::{AttemptId, AttemptRow};

use crate::error::SessionError;

//
// ─── OPTIONS ──────────────────────────────────────────────────────────────────
//

/// Identifiers needed to persist an attempt for the active part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptTracking {
    pub user_id: UserId,
    pub exercise_id: ExerciseId,
    pub part_id: PartId,
    /// `None` for standalone practice.
    pub theme_id: Option<ThemeId>,
}

/// How a session is set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Part shown first; defaults to the lowest-numbered part.
    pub initial_part: Option<PartNumber>,
    /// Practice contexts pin the session to its initial part.
    pub single_part: bool,
    pub tracking: Option<AttemptTracking>,
    pub points_per_question: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            initial_part: None,
            single_part: false,
            tracking: None,
            points_per_question: POINTS_PER_QUESTION,
        }
    }
}

//
// ─── PER-PART STATE ───────────────────────────────────────────────────────────
//

/// Answer state of one part, shaped by its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartAnswers {
    Matching(MatchingBoard),
    MultipleChoice(Choices),
}

impl PartAnswers {
    fn for_kind(kind: PartKind) -> Self {
        match kind {
            PartKind::Matching => PartAnswers::Matching(MatchingBoard::new()),
            PartKind::MultipleChoice => PartAnswers::MultipleChoice(Choices::new()),
        }
    }

    #[must_use]
    pub fn mapping(&self) -> &Mapping {
        match self {
            PartAnswers::Matching(board) => board.mapping(),
            PartAnswers::MultipleChoice(choices) => choices.mapping(),
        }
    }

    fn reset_all(&self) -> Self {
        match self {
            PartAnswers::Matching(board) => PartAnswers::Matching(board.reset_all()),
            PartAnswers::MultipleChoice(choices) => PartAnswers::MultipleChoice(choices.reset_all()),
        }
    }

    fn without_focus(&self) -> Self {
        match self {
            PartAnswers::Matching(board) => PartAnswers::Matching(board.without_focus()),
            PartAnswers::MultipleChoice(_) => self.clone(),
        }
    }
}

struct PartSlot {
    part: Part,
    answers: PartAnswers,
    grade: Option<GradeResult>,
}

/// Where the attempt of a submitted session stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    /// No tracking identifiers, no answer key, or not submitted yet.
    None,
    /// Graded and waiting to be saved (first try or a retry).
    Pending(Attempt),
    /// Handed over to the retry outbox after a failed save.
    Queued(Attempt),
    Saved { id: AttemptId, attempt: Attempt },
}

/// Result of a successful submit / give-up on the session itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub part: PartNumber,
    /// Grade of the active part; `None` if it has no answer key.
    pub grade: Option<GradeResult>,
    /// Attempt to persist, if tracking identifiers were supplied.
    pub attempt: Option<Attempt>,
}

//
// ─── SESSION ──────────────────────────────────────────────────────────────────
//

/// One exam attempt: owns every part's answers and the submission lifecycle.
///
/// `InProgress -> Submitted` is one-way. Once submitted, every answer
/// mutation is a no-op that returns the mapping unchanged.
pub struct ExamSession {
    parts: Vec<PartSlot>,
    active: usize,
    single_part: bool,
    tracking: Option<AttemptTracking>,
    points_per_question: u32,
    submitted: bool,
    solutions_visible: bool,
    started_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    attempt: AttemptState,
}

impl ExamSession {
    /// Create a session over `parts`.
    ///
    /// `started_at` should come from the services layer clock.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` without parts, `DuplicatePart` if two
    /// parts share a number, or `UnknownPart` for a bad initial part.
    pub fn new(
        mut parts: Vec<Part>,
        options: SessionOptions,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if parts.is_empty() {
            return Err(SessionError::Empty);
        }
        parts.sort_by_key(Part::number);
        let mut seen = BTreeSet::new();
        for part in &parts {
            if !seen.insert(part.number()) {
                return Err(SessionError::DuplicatePart(part.number()));
            }
        }

        let active = match options.initial_part {
            Some(number) => parts
                .iter()
                .position(|p| p.number() == number)
                .ok_or(SessionError::UnknownPart(number))?,
            None => 0,
        };

        let parts = parts
            .into_iter()
            .map(|part| PartSlot {
                answers: PartAnswers::for_kind(part.kind()),
                part,
                grade: None,
            })
            .collect();

        Ok(Self {
            parts,
            active,
            single_part: options.single_part,
            tracking: options.tracking,
            points_per_question: options.points_per_question,
            submitted: false,
            solutions_visible: false,
            started_at,
            submitted_at: None,
            attempt: AttemptState::None,
        })
    }

    // ─── Navigation ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn active_part(&self) -> PartNumber {
        self.parts[self.active].part.number()
    }

    #[must_use]
    pub fn is_single_part(&self) -> bool {
        self.single_part
    }

    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        self.parts.iter().map(|slot| &slot.part)
    }

    #[must_use]
    pub fn part(&self, number: PartNumber) -> Option<&Part> {
        self.slot(number).map(|slot| &slot.part)
    }

    /// Make `number` the active part.
    ///
    /// Returns whether the active part changed. Ignored (returns `false`) in
    /// single-part mode. Focus is dropped on every part change.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownPart` if the exam has no such part.
    pub fn switch_part(&mut self, number: PartNumber) -> Result<bool, SessionError> {
        if self.single_part {
            tracing::debug!(part = %number, "part switch ignored in single-part mode");
            return Ok(false);
        }
        let index = self
            .parts
            .iter()
            .position(|slot| slot.part.number() == number)
            .ok_or(SessionError::UnknownPart(number))?;
        if index == self.active {
            return Ok(false);
        }
        for slot in &mut self.parts {
            slot.answers = slot.answers.without_focus();
        }
        self.active = index;
        Ok(true)
    }

    // ─── Answer state ────────────────────────────────────────────────────────

    #[must_use]
    pub fn mapping(&self, number: PartNumber) -> Option<&Mapping> {
        self.slot(number).map(|slot| slot.answers.mapping())
    }

    #[must_use]
    pub fn active_mapping(&self) -> &Mapping {
        self.parts[self.active].answers.mapping()
    }

    #[must_use]
    pub fn answers(&self, number: PartNumber) -> Option<&PartAnswers> {
        self.slot(number).map(|slot| &slot.answers)
    }

    /// Focused prompt of the active part (matching parts only).
    #[must_use]
    pub fn focused(&self) -> Option<PromptId> {
        match &self.parts[self.active].answers {
            PartAnswers::Matching(board) => board.focused(),
            PartAnswers::MultipleChoice(_) => None,
        }
    }

    /// Whether `key` can still be picked from the active part's pool.
    #[must_use]
    pub fn is_available(&self, key: &OptionKey) -> bool {
        match &self.parts[self.active].answers {
            PartAnswers::Matching(board) => board.assignments().is_available(key),
            PartAnswers::MultipleChoice(_) => false,
        }
    }

    // ─── Matching mutations ──────────────────────────────────────────────────

    /// Place `key` on `prompt` (drag from the pool onto a slot).
    ///
    /// # Errors
    ///
    /// Returns a rejection for unknown ids or a non-matching active part.
    pub fn assign(&mut self, prompt: PromptId, key: OptionKey) -> Result<&Mapping, SessionError> {
        self.with_board("assign", |part, board| {
            check_option(part, prompt, &key)?;
            Ok(board.drop_from_pool(prompt, key))
        })
    }

    /// Empty `prompt`'s slot.
    ///
    /// # Errors
    ///
    /// Returns a rejection for unknown ids or a non-matching active part.
    pub fn clear(&mut self, prompt: PromptId) -> Result<&Mapping, SessionError> {
        self.with_board("clear", |part, board| {
            check_prompt(part, prompt)?;
            Ok(board.drop_on_pool(prompt))
        })
    }

    /// Drag the option on `from` onto `to`.
    ///
    /// # Errors
    ///
    /// Returns a rejection for unknown ids or a non-matching active part.
    pub fn move_between(
        &mut self,
        from: PromptId,
        to: PromptId,
        key: OptionKey,
    ) -> Result<&Mapping, SessionError> {
        self.with_board("move", |part, board| {
            check_prompt(part, from)?;
            check_option(part, to, &key)?;
            Ok(board.drop_from_prompt(from, to, key))
        })
    }

    /// Drop the option held by `from` back onto the pool.
    ///
    /// # Errors
    ///
    /// Returns a rejection for unknown ids or a non-matching active part.
    pub fn drop_on_pool(&mut self, from: PromptId) -> Result<&Mapping, SessionError> {
        self.clear(from)
    }

    /// Click a prompt's slot: clears a filled slot, toggles focus on an empty one.
    ///
    /// # Errors
    ///
    /// Returns a rejection for unknown ids or a non-matching active part.
    pub fn click_prompt(&mut self, prompt: PromptId) -> Result<&Mapping, SessionError> {
        self.with_board("click_prompt", |part, board| {
            check_prompt(part, prompt)?;
            Ok(board.click_prompt(prompt))
        })
    }

    /// Click an option in the pool while a prompt is focused.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Pick` if the option is already placed or nothing
    /// is focused, plus the usual id and part-kind rejections.
    pub fn click_option(&mut self, key: OptionKey) -> Result<&Mapping, SessionError> {
        self.with_board("click_option", |part, board| {
            if let Some(prompt) = board.focused() {
                check_option(part, prompt, &key)?;
            }
            Ok(board.click_option(key)?)
        })
    }

    // ─── Multiple-choice mutations ───────────────────────────────────────────

    /// Choose `key` for `prompt` in a multiple-choice part.
    ///
    /// # Errors
    ///
    /// Returns a rejection for unknown ids or a non-choice active part.
    pub fn select(&mut self, prompt: PromptId, key: OptionKey) -> Result<&Mapping, SessionError> {
        self.mutate("select", |part, answers| match answers {
            PartAnswers::MultipleChoice(choices) => {
                check_option(part, prompt, &key)?;
                Ok(PartAnswers::MultipleChoice(choices.select(prompt, key)))
            }
            PartAnswers::Matching(_) => Err(SessionError::WrongPartKind {
                part: part.number(),
                expected: PartKind::MultipleChoice,
            }),
        })
    }

    /// Clear every answer of the active part.
    ///
    /// # Errors
    ///
    /// Never fails today; returns `Result` to match the other mutations.
    pub fn reset_all(&mut self) -> Result<&Mapping, SessionError> {
        self.mutate("reset_all", |_, answers| Ok(answers.reset_all()))
    }

    // ─── Completion ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn completion(&self, number: PartNumber) -> Option<Completion> {
        self.slot(number)
            .map(|slot| Completion::of(slot.answers.mapping(), slot.part.prompts()))
    }

    /// Complete flag for every part, recomputed from current answers.
    #[must_use]
    pub fn completion_status(&self) -> BTreeMap<PartNumber, bool> {
        self.parts
            .iter()
            .map(|slot| {
                let done = Completion::of(slot.answers.mapping(), slot.part.prompts());
                (slot.part.number(), done.is_complete())
            })
            .collect()
    }

    #[must_use]
    pub fn is_active_complete(&self) -> bool {
        let slot = &self.parts[self.active];
        Completion::of(slot.answers.mapping(), slot.part.prompts()).is_complete()
    }

    // ─── Submission ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    #[must_use]
    pub fn solutions_visible(&self) -> bool {
        self.solutions_visible
    }

    /// Grade and freeze the exam. The active part must be complete.
    ///
    /// `submitted_at` should come from the services layer clock.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Incomplete`, `SessionError::AlreadySubmitted`,
    /// or `SessionError::Attempt` when the graded attempt cannot be recorded;
    /// the session is unchanged in every case.
    pub fn submit(&mut self, submitted_at: DateTime<Utc>) -> Result<Submission, SessionError> {
        if self.submitted {
            return Err(SessionError::AlreadySubmitted);
        }
        if !self.is_active_complete() {
            tracing::debug!(part = %self.active_part(), "submit rejected: part incomplete");
            return Err(SessionError::Incomplete {
                part: self.active_part(),
            });
        }
        let attempt = self.pending_attempt(submitted_at)?;
        Ok(self.finish(submitted_at, attempt))
    }

    /// Give up: grade and freeze regardless of completeness, and show solutions.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadySubmitted` if the exam is already graded,
    /// or `SessionError::Attempt` (session unchanged) when the graded attempt
    /// cannot be recorded.
    pub fn give_up(&mut self, submitted_at: DateTime<Utc>) -> Result<Submission, SessionError> {
        if self.submitted {
            return Err(SessionError::AlreadySubmitted);
        }
        let attempt = self.pending_attempt(submitted_at)?;
        let submission = self.finish(submitted_at, attempt);
        self.solutions_visible = true;
        Ok(submission)
    }

    /// Flip solution visibility; returns the new value.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotSubmitted` before submission.
    pub fn toggle_solutions(&mut self) -> Result<bool, SessionError> {
        if !self.submitted {
            return Err(SessionError::NotSubmitted);
        }
        self.solutions_visible = !self.solutions_visible;
        Ok(self.solutions_visible)
    }

    #[must_use]
    pub fn grade(&self, number: PartNumber) -> Option<&GradeResult> {
        self.slot(number).and_then(|slot| slot.grade.as_ref())
    }

    /// Correctness of one prompt once graded.
    #[must_use]
    pub fn outcome(&self, number: PartNumber, prompt: PromptId) -> Option<bool> {
        self.grade(number).and_then(|g| g.outcome(prompt))
    }

    /// Correct option for a wrongly answered prompt, only while solutions are shown.
    #[must_use]
    pub fn revealed_solution(&self, number: PartNumber, prompt: PromptId) -> Option<&OptionKey> {
        if !self.submitted || !self.solutions_visible {
            return None;
        }
        if self.outcome(number, prompt) != Some(false) {
            return None;
        }
        self.part(number)
            .and_then(Part::answer_key)
            .and_then(|key| key.get(prompt))
    }

    // ─── Timing & attempt ────────────────────────────────────────────────────

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    /// Time spent so far, frozen at submission. Display only.
    #[must_use]
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        elapsed(self.started_at, self.submitted_at.unwrap_or(now))
    }

    #[must_use]
    pub fn tracking(&self) -> Option<&AttemptTracking> {
        self.tracking.as_ref()
    }

    #[must_use]
    pub fn attempt_state(&self) -> &AttemptState {
        &self.attempt
    }

    #[must_use]
    pub fn attempt_id(&self) -> Option<AttemptId> {
        match self.attempt {
            AttemptState::Saved { id, .. } => Some(id),
            _ => None,
        }
    }

    pub(crate) fn mark_saved(&mut self, id: AttemptId) {
        if let AttemptState::Pending(attempt) = &self.attempt {
            self.attempt = AttemptState::Saved {
                id,
                attempt: attempt.clone(),
            };
        }
    }

    pub(crate) fn mark_queued(&mut self) {
        if let AttemptState::Pending(attempt) = &self.attempt {
            self.attempt = AttemptState::Queued(attempt.clone());
        }
    }

    /// Pick up the id of a queued attempt that an outbox flush saved.
    ///
    /// Returns the id when this session's attempt is among `saved`.
    pub fn reconcile_flushed(&mut self, saved: &[AttemptRow]) -> Option<AttemptId> {
        let AttemptState::Queued(attempt) = &self.attempt else {
            return None;
        };
        let row = saved.iter().find(|row| &row.attempt == attempt)?;
        self.attempt = AttemptState::Saved {
            id: row.id,
            attempt: row.attempt.clone(),
        };
        tracing::debug!(id = row.id, "queued attempt saved by outbox");
        Some(row.id)
    }

    // ─── Internals ───────────────────────────────────────────────────────────

    fn slot(&self, number: PartNumber) -> Option<&PartSlot> {
        self.parts.iter().find(|slot| slot.part.number() == number)
    }

    fn finish(&mut self, submitted_at: DateTime<Utc>, attempt: Option<Attempt>) -> Submission {
        for slot in &mut self.parts {
            slot.answers = slot.answers.without_focus();
            slot.grade = slot
                .part
                .answer_key()
                .filter(|key| !key.is_empty())
                .map(|key| grade(slot.answers.mapping(), key));
        }
        self.submitted = true;
        self.submitted_at = Some(submitted_at);

        let part = self.active_part();
        let grade = self.parts[self.active].grade.clone();
        if let Some(attempt) = &attempt {
            self.attempt = AttemptState::Pending(attempt.clone());
        }

        tracing::info!(
            %part,
            correct = grade.as_ref().map(GradeResult::correct),
            total = grade.as_ref().map(GradeResult::total),
            tracked = attempt.is_some(),
            "exam submitted"
        );

        Submission {
            part,
            grade,
            attempt,
        }
    }

    /// The attempt the active part would produce if graded now.
    ///
    /// `None` without tracking identifiers or a usable answer key.
    fn pending_attempt(&self, created_at: DateTime<Utc>) -> Result<Option<Attempt>, SessionError> {
        let Some(tracking) = self.tracking else {
            return Ok(None);
        };
        let slot = &self.parts[self.active];
        let Some(key) = slot.part.answer_key().filter(|key| !key.is_empty()) else {
            return Ok(None);
        };
        let result = grade(slot.answers.mapping(), key);
        if result.total() == 0 {
            return Ok(None);
        }
        let attempt = Attempt::new(
            tracking.user_id,
            tracking.exercise_id,
            tracking.part_id,
            tracking.theme_id,
            result.correct(),
            result.total(),
            self.points_per_question,
            created_at,
        )
        .inspect_err(|error| tracing::warn!(%error, "graded attempt could not be built"))?;
        Ok(Some(attempt))
    }

    /// Apply `f` to the active part's answers and install the result whole.
    fn mutate<F>(&mut self, op: &'static str, f: F) -> Result<&Mapping, SessionError>
    where
        F: FnOnce(&Part, &PartAnswers) -> Result<PartAnswers, SessionError>,
    {
        if self.submitted {
            tracing::debug!(op, "mutation ignored after submission");
            return Ok(self.parts[self.active].answers.mapping());
        }
        let slot = &mut self.parts[self.active];
        let next = f(&slot.part, &slot.answers)?;
        slot.answers = next;
        Ok(slot.answers.mapping())
    }

    fn with_board<F>(&mut self, op: &'static str, f: F) -> Result<&Mapping, SessionError>
    where
        F: FnOnce(&Part, &MatchingBoard) -> Result<MatchingBoard, SessionError>,
    {
        self.mutate(op, |part, answers| match answers {
            PartAnswers::Matching(board) => Ok(PartAnswers::Matching(f(part, board)?)),
            PartAnswers::MultipleChoice(_) => Err(SessionError::WrongPartKind {
                part: part.number(),
                expected: PartKind::Matching,
            }),
        })
    }
}

fn check_prompt(part: &Part, prompt: PromptId) -> Result<(), SessionError> {
    if part.prompt(prompt).is_none() {
        return Err(SessionError::UnknownPrompt {
            part: part.number(),
            prompt,
        });
    }
    Ok(())
}

fn check_option(part: &Part, prompt: PromptId, key: &OptionKey) -> Result<(), SessionError> {
    check_prompt(part, prompt)?;
    if !part.accepts(prompt, key) {
        return Err(SessionError::UnknownOption {
            prompt,
            key: key.clone(),
        });
    }
    Ok(())
}

impl fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamSession")
            .field("parts_len", &self.parts.len())
            .field("active_part", &self.active_part())
            .field("single_part", &self.single_part)
            .field("submitted", &self.submitted)
            .field("solutions_visible", &self.solutions_visible)
            .field("started_at", &self.started_at)
            .field("submitted_at", &self.submitted_at)
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{AnswerKey, AnswerOption, Prompt};
    use exam_core::time::fixed_now;

    fn p(id: u32) -> PromptId {
        PromptId::new(id)
    }

    fn k(key: &str) -> OptionKey {
        OptionKey::new(key)
    }

    fn matching_part() -> Part {
        let prompts = (1..=3)
            .map(|id| Prompt::paragraph(p(id), format!("Text {id}")))
            .collect();
        let options = ["A", "B", "C", "D"]
            .iter()
            .map(|key| AnswerOption::new(*key, format!("Heading {key}")))
            .collect();
        let key: AnswerKey = [(p(1), k("A")), (p(2), k("C")), (p(3), k("D"))]
            .into_iter()
            .collect();
        Part::matching(PartNumber::new(1), "Part 1", prompts, options, Some(key)).unwrap()
    }

    fn choice_part() -> Part {
        let prompts = (6..=7)
            .map(|id| {
                Prompt::question(
                    p(id),
                    format!("Question {id}"),
                    vec![
                        AnswerOption::new("a", "first"),
                        AnswerOption::new("b", "second"),
                        AnswerOption::new("c", "third"),
                    ],
                )
            })
            .collect();
        let key: AnswerKey = [(p(6), k("b")), (p(7), k("a"))].into_iter().collect();
        Part::multiple_choice(PartNumber::new(2), "Part 2", prompts, Some(key)).unwrap()
    }

    fn tracking() -> AttemptTracking {
        AttemptTracking {
            user_id: UserId::random(),
            exercise_id: ExerciseId::new(10),
            part_id: PartId::new(1),
            theme_id: None,
        }
    }

    fn session(options: SessionOptions) -> ExamSession {
        ExamSession::new(vec![choice_part(), matching_part()], options, fixed_now()).unwrap()
    }

    fn fill_matching(session: &mut ExamSession) {
        session.assign(p(1), k("A")).unwrap();
        session.assign(p(2), k("B")).unwrap();
        session.assign(p(3), k("D")).unwrap();
    }

    #[test]
    fn empty_exam_is_rejected() {
        let err = ExamSession::new(Vec::new(), SessionOptions::default(), fixed_now()).unwrap_err();
        assert!(matches!(err, SessionError::Empty));
    }

    #[test]
    fn parts_are_ordered_and_first_is_active() {
        let session = session(SessionOptions::default());
        assert_eq!(session.active_part(), PartNumber::new(1));
        let numbers: Vec<_> = session.parts().map(Part::number).collect();
        assert_eq!(numbers, vec![PartNumber::new(1), PartNumber::new(2)]);
    }

    #[test]
    fn unknown_initial_part_is_rejected() {
        let options = SessionOptions {
            initial_part: Some(PartNumber::new(5)),
            ..SessionOptions::default()
        };
        let err = ExamSession::new(vec![matching_part()], options, fixed_now()).unwrap_err();
        assert!(matches!(err, SessionError::UnknownPart(_)));
    }

    #[test]
    fn assign_keeps_one_to_one() {
        let mut session = session(SessionOptions::default());
        session.assign(p(1), k("A")).unwrap();
        let mapping = session.assign(p(2), k("A")).unwrap();

        assert_eq!(mapping.get(p(1)), None);
        assert_eq!(mapping.get(p(2)), Some(&k("A")));
    }

    #[test]
    fn unknown_prompt_and_option_are_rejected_without_change() {
        let mut session = session(SessionOptions::default());
        session.assign(p(1), k("A")).unwrap();

        let err = session.assign(p(9), k("B")).unwrap_err();
        assert!(matches!(err, SessionError::UnknownPrompt { .. }));
        let err = session.assign(p(2), k("Z")).unwrap_err();
        assert!(matches!(err, SessionError::UnknownOption { .. }));
        assert_eq!(session.active_mapping().len(), 1);
    }

    #[test]
    fn matching_ops_on_choice_part_are_rejected() {
        let mut session = session(SessionOptions::default());
        session.switch_part(PartNumber::new(2)).unwrap();

        let err = session.assign(p(6), k("a")).unwrap_err();
        assert!(matches!(
            err,
            SessionError::WrongPartKind {
                expected: PartKind::Matching,
                ..
            }
        ));
        let mapping = session.select(p(6), k("a")).unwrap();
        assert_eq!(mapping.get(p(6)), Some(&k("a")));
    }

    #[test]
    fn choice_keys_are_checked_per_question() {
        let mut session = session(SessionOptions::default());
        session.switch_part(PartNumber::new(2)).unwrap();
        let err = session.select(p(6), k("d")).unwrap_err();
        assert!(matches!(err, SessionError::UnknownOption { .. }));
    }

    #[test]
    fn focus_then_pick_assigns() {
        let mut session = session(SessionOptions::default());
        session.click_prompt(p(2)).unwrap();
        assert_eq!(session.focused(), Some(p(2)));

        let mapping = session.click_option(k("C")).unwrap();
        assert_eq!(mapping.get(p(2)), Some(&k("C")));
        assert_eq!(session.focused(), None);
        assert!(!session.is_available(&k("C")));
    }

    #[test]
    fn picking_placed_option_changes_nothing() {
        let mut session = session(SessionOptions::default());
        session.assign(p(1), k("A")).unwrap();
        session.click_prompt(p(2)).unwrap();

        let err = session.click_option(k("A")).unwrap_err();
        assert!(matches!(err, SessionError::Pick(_)));
        assert_eq!(session.focused(), Some(p(2)));
        assert_eq!(session.active_mapping().get(p(2)), None);
    }

    #[test]
    fn part_switch_resets_focus() {
        let mut session = session(SessionOptions::default());
        session.click_prompt(p(1)).unwrap();
        assert!(session.switch_part(PartNumber::new(2)).unwrap());
        assert!(session.switch_part(PartNumber::new(1)).unwrap());
        assert_eq!(session.focused(), None);
    }

    #[test]
    fn single_part_mode_ignores_switch() {
        let mut session = session(SessionOptions {
            single_part: true,
            ..SessionOptions::default()
        });
        assert!(!session.switch_part(PartNumber::new(2)).unwrap());
        assert_eq!(session.active_part(), PartNumber::new(1));
    }

    #[test]
    fn incomplete_submit_is_rejected() {
        let mut session = session(SessionOptions::default());
        session.assign(p(1), k("A")).unwrap();

        let err = session.submit(fixed_now()).unwrap_err();
        assert!(matches!(err, SessionError::Incomplete { .. }));
        assert!(!session.is_submitted());
        assert_eq!(session.attempt_state(), &AttemptState::None);
    }

    #[test]
    fn submit_grades_and_builds_attempt() {
        let options = SessionOptions {
            tracking: Some(tracking()),
            ..SessionOptions::default()
        };
        let mut session = session(options);
        fill_matching(&mut session);

        let submission = session.submit(fixed_now()).unwrap();
        let grade = submission.grade.unwrap();
        assert_eq!(grade.correct(), 2);
        assert_eq!(grade.total(), 3);

        let attempt = submission.attempt.unwrap();
        assert_eq!(attempt.correct_count(), 2);
        assert_eq!(attempt.obtained(), 10);
        assert_eq!(attempt.possible(), 15);
        assert!(matches!(session.attempt_state(), AttemptState::Pending(_)));

        // Part 2 is graded too even though it was never touched.
        let other = session.grade(PartNumber::new(2)).unwrap();
        assert_eq!(other.correct(), 0);
        assert_eq!(other.total(), 2);
    }

    #[test]
    fn mutations_after_submit_are_noops() {
        let mut session = session(SessionOptions::default());
        fill_matching(&mut session);
        session.submit(fixed_now()).unwrap();
        let before = session.active_mapping().clone();

        assert_eq!(session.assign(p(1), k("C")).unwrap(), &before);
        assert_eq!(session.clear(p(1)).unwrap(), &before);
        assert_eq!(session.reset_all().unwrap(), &before);
        assert_eq!(session.click_prompt(p(2)).unwrap(), &before);
        assert_eq!(session.focused(), None);
        assert_eq!(session.move_between(p(1), p(2), k("A")).unwrap(), &before);
        assert_eq!(session.drop_on_pool(p(3)).unwrap(), &before);
        assert_eq!(session.click_option(k("C")).unwrap(), &before);
        assert!(matches!(
            session.submit(fixed_now()),
            Err(SessionError::AlreadySubmitted)
        ));

        // Reviewing another part is allowed, answering it is not.
        assert!(session.switch_part(PartNumber::new(2)).unwrap());
        let untouched = session.active_mapping().clone();
        assert_eq!(session.select(p(6), k("b")).unwrap(), &untouched);
        assert_eq!(session.mapping(PartNumber::new(2)), Some(&untouched));
        assert_eq!(session.mapping(PartNumber::new(1)), Some(&before));
    }

    #[test]
    fn unrecordable_attempt_rejects_submit_without_change() {
        let options = SessionOptions {
            tracking: Some(tracking()),
            points_per_question: u32::MAX,
            ..SessionOptions::default()
        };
        let mut session = session(options);
        fill_matching(&mut session);
        let before = session.active_mapping().clone();

        let err = session.submit(fixed_now()).unwrap_err();
        assert!(matches!(err, SessionError::Attempt(_)));
        assert!(!session.is_submitted());
        assert_eq!(session.grade(PartNumber::new(1)), None);
        assert_eq!(session.attempt_state(), &AttemptState::None);
        assert_eq!(session.active_mapping(), &before);

        assert!(matches!(
            session.give_up(fixed_now()),
            Err(SessionError::Attempt(_))
        ));
        assert!(!session.solutions_visible());
        assert_eq!(session.submitted_at(), None);
    }

    #[test]
    fn flushed_attempt_is_reconciled_once_queued() {
        let options = SessionOptions {
            tracking: Some(tracking()),
            ..SessionOptions::default()
        };
        let mut session = session(options);
        fill_matching(&mut session);
        let attempt = session.submit(fixed_now()).unwrap().attempt.unwrap();
        let rows = vec![AttemptRow::new(7, attempt.clone())];

        // Only queued attempts are picked up.
        assert_eq!(session.reconcile_flushed(&rows), None);
        session.mark_queued();
        assert_eq!(session.reconcile_flushed(&[]), None);
        assert!(matches!(session.attempt_state(), AttemptState::Queued(_)));

        assert_eq!(session.reconcile_flushed(&rows), Some(7));
        assert_eq!(session.attempt_id(), Some(7));
        assert_eq!(
            session.attempt_state(),
            &AttemptState::Saved { id: 7, attempt }
        );
    }

    #[test]
    fn give_up_ignores_completeness_and_shows_solutions() {
        let mut session = session(SessionOptions::default());
        session.assign(p(1), k("B")).unwrap();

        let submission = session.give_up(fixed_now()).unwrap();
        assert_eq!(submission.grade.unwrap().correct(), 0);
        assert!(session.is_submitted());
        assert!(session.solutions_visible());
        assert_eq!(
            session.revealed_solution(PartNumber::new(1), p(1)),
            Some(&k("A"))
        );
    }

    #[test]
    fn solutions_toggle_only_after_submit() {
        let mut session = session(SessionOptions::default());
        assert!(matches!(
            session.toggle_solutions(),
            Err(SessionError::NotSubmitted)
        ));

        fill_matching(&mut session);
        session.submit(fixed_now()).unwrap();
        assert!(!session.solutions_visible());
        assert_eq!(session.revealed_solution(PartNumber::new(1), p(2)), None);

        assert!(session.toggle_solutions().unwrap());
        assert_eq!(
            session.revealed_solution(PartNumber::new(1), p(2)),
            Some(&k("C"))
        );
        // Correct answers are never "revealed".
        assert_eq!(session.revealed_solution(PartNumber::new(1), p(1)), None);
        assert!(!session.toggle_solutions().unwrap());
    }

    #[test]
    fn part_without_key_is_skipped_and_not_tracked() {
        let no_key = Part::matching(
            PartNumber::new(1),
            "Part 1",
            vec![Prompt::paragraph(p(1), "Text")],
            vec![AnswerOption::new("A", "H")],
            None,
        )
        .unwrap();
        let options = SessionOptions {
            tracking: Some(tracking()),
            ..SessionOptions::default()
        };
        let mut session = ExamSession::new(vec![no_key], options, fixed_now()).unwrap();
        session.assign(p(1), k("A")).unwrap();

        let submission = session.submit(fixed_now()).unwrap();
        assert!(submission.grade.is_none());
        assert!(submission.attempt.is_none());
        assert!(session.grade(PartNumber::new(1)).is_none());
    }

    #[test]
    fn completion_status_tracks_every_part() {
        let mut session = session(SessionOptions::default());
        fill_matching(&mut session);
        let status = session.completion_status();
        assert_eq!(status.get(&PartNumber::new(1)), Some(&true));
        assert_eq!(status.get(&PartNumber::new(2)), Some(&false));

        session.reset_all().unwrap();
        assert!(!session.is_active_complete());
    }

    #[test]
    fn elapsed_freezes_at_submission() {
        let mut session = session(SessionOptions::default());
        fill_matching(&mut session);
        session
            .submit(fixed_now() + Duration::minutes(12))
            .unwrap();
        assert_eq!(
            session.elapsed(fixed_now() + Duration::hours(2)),
            Duration::minutes(12)
        );
    }
}
