#![forbid(unsafe_code)]

pub mod app_services;
pub mod attempt_service;
pub mod error;
pub mod exam;
pub mod outbox;

pub use exam_core::Clock;

pub use app_services::AppServices;
pub use attempt_service::{AttemptListItem, AttemptService};
pub use error::{AppServicesError, AttemptServiceError, ContentError, SessionError};
pub use exam::{
    AttemptState, AttemptTracking, ExamContent, ExamLoopService, ExamSession, PartAnswers,
    SaveStatus, SessionOptions, SubmitOutcome,
};
pub use outbox::{AttemptOutbox, FlushReport};
