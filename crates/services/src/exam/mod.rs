mod content;
mod session;
mod workflow;

// Public API of the exam subsystem.
pub use crate::error::{ContentError, SessionError};
pub use content::ExamContent;
pub use session::{
    AttemptState, AttemptTracking, ExamSession, PartAnswers, SessionOptions, Submission,
};
pub use workflow::{ExamLoopService, SaveStatus, SubmitOutcome};
