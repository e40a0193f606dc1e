use std::sync::Arc;

use exam_core::grading::GradeResult;
use exam_core::model::{POINTS_PER_QUESTION, Part, PartNumber};
use storage::repository::{AttemptId, AttemptRepository, StorageError};

use super::session::{AttemptState, AttemptTracking, ExamSession, SessionOptions, Submission};
use crate::Clock;
use crate::error::SessionError;
use crate::outbox::{AttemptOutbox, FlushReport};

/// What happened to the attempt of a submission.
#[derive(Debug)]
pub enum SaveStatus {
    /// No tracking identifiers, or nothing gradable in the active part.
    Skipped,
    Saved(AttemptId),
    /// Grading stands; the save did not. `queued` tells whether the
    /// attempt went to the outbox.
    Failed { error: StorageError, queued: bool },
}

impl SaveStatus {
    #[must_use]
    pub fn attempt_id(&self) -> Option<AttemptId> {
        match self {
            SaveStatus::Saved(id) => Some(*id),
            _ => None,
        }
    }
}

/// Result of submitting (or giving up) through the loop service.
#[derive(Debug)]
pub struct SubmitOutcome {
    pub part: PartNumber,
    pub grade: Option<GradeResult>,
    pub save: SaveStatus,
}

/// Orchestrates session start, submission and attempt persistence.
#[derive(Clone)]
pub struct ExamLoopService {
    clock: Clock,
    attempts: Arc<dyn AttemptRepository>,
    points_per_question: u32,
    outbox: Option<Arc<AttemptOutbox>>,
}

impl ExamLoopService {
    #[must_use]
    pub fn new(clock: Clock, attempts: Arc<dyn AttemptRepository>) -> Self {
        Self {
            clock,
            attempts,
            points_per_question: POINTS_PER_QUESTION,
            outbox: None,
        }
    }

    #[must_use]
    pub fn with_points_per_question(mut self, points: u32) -> Self {
        self.points_per_question = points;
        self
    }

    /// Hand failed saves to `outbox` instead of leaving them on the session.
    #[must_use]
    pub fn with_outbox(mut self, outbox: Arc<AttemptOutbox>) -> Self {
        self.outbox = Some(outbox);
        self
    }

    #[must_use]
    pub fn outbox(&self) -> Option<&Arc<AttemptOutbox>> {
        self.outbox.as_ref()
    }

    /// Start a session over `parts`, stamped with the service clock.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the parts cannot form an exam.
    pub fn start_session(
        &self,
        parts: Vec<Part>,
        initial_part: Option<PartNumber>,
        single_part: bool,
        tracking: Option<AttemptTracking>,
    ) -> Result<ExamSession, SessionError> {
        let options = SessionOptions {
            initial_part,
            single_part,
            tracking,
            points_per_question: self.points_per_question,
        };
        let session = ExamSession::new(parts, options, self.clock.now())?;
        tracing::debug!(
            part = %session.active_part(),
            single_part,
            tracked = tracking.is_some(),
            "exam session started"
        );
        Ok(session)
    }

    /// Submit the active part and save its attempt.
    ///
    /// A failed save does not undo the submission; it is reported in
    /// `SubmitOutcome::save`.
    ///
    /// # Errors
    ///
    /// Returns the session's rejection (`Incomplete`, `AlreadySubmitted`,
    /// `Attempt`).
    pub async fn submit(&self, session: &mut ExamSession) -> Result<SubmitOutcome, SessionError> {
        let submission = session.submit(self.clock.now())?;
        Ok(self.persist(session, submission).await)
    }

    /// Give up: grade regardless of completeness, reveal solutions, save.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadySubmitted` if already graded.
    pub async fn give_up(&self, session: &mut ExamSession) -> Result<SubmitOutcome, SessionError> {
        let submission = session.give_up(self.clock.now())?;
        Ok(self.persist(session, submission).await)
    }

    /// Retry the attempt save of a submitted session.
    ///
    /// Returns the stored id when the attempt is already saved; never saves
    /// the same attempt twice.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotSubmitted` before submission,
    /// `SessionError::Storage` if the save fails again.
    pub async fn finalize_attempt(
        &self,
        session: &mut ExamSession,
    ) -> Result<Option<AttemptId>, SessionError> {
        if !session.is_submitted() {
            return Err(SessionError::NotSubmitted);
        }
        let attempt = match session.attempt_state() {
            AttemptState::None | AttemptState::Queued(_) => return Ok(None),
            AttemptState::Saved { id, .. } => return Ok(Some(*id)),
            AttemptState::Pending(attempt) => attempt.clone(),
        };
        let id = self.attempts.append_attempt(&attempt).await?;
        session.mark_saved(id);
        tracing::info!(id, "attempt saved on retry");
        Ok(Some(id))
    }

    /// Retry the outbox and move `session` to saved if its queued attempt
    /// went through. `None` when no outbox is configured.
    pub async fn flush_outbox(&self, session: &mut ExamSession) -> Option<FlushReport> {
        let outbox = self.outbox.as_ref()?;
        let report = outbox.flush(self.attempts.as_ref()).await;
        session.reconcile_flushed(&report.saved);
        Some(report)
    }

    async fn persist(&self, session: &mut ExamSession, submission: Submission) -> SubmitOutcome {
        let Submission {
            part,
            grade,
            attempt,
        } = submission;

        let save = match attempt {
            None => {
                tracing::debug!(%part, "attempt save skipped");
                SaveStatus::Skipped
            }
            Some(attempt) => match self.attempts.append_attempt(&attempt).await {
                Ok(id) => {
                    session.mark_saved(id);
                    tracing::info!(
                        id,
                        %part,
                        obtained = attempt.obtained(),
                        possible = attempt.possible(),
                        "attempt saved"
                    );
                    SaveStatus::Saved(id)
                }
                Err(error) => {
                    let queued = match &self.outbox {
                        Some(outbox) => {
                            outbox.push(attempt);
                            session.mark_queued();
                            true
                        }
                        None => false,
                    };
                    tracing::warn!(%error, %part, queued, "attempt save failed");
                    SaveStatus::Failed { error, queued }
                }
            },
        };

        SubmitOutcome { part, grade, save }
    }
}
