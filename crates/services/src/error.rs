//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::matching::PickError;
use exam_core::model::{AttemptError, OptionKey, PartError, PartKind, PartNumber, PromptId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by exam sessions.
///
/// Everything except `Storage` is a local rejection: the session is left
/// exactly as it was and nothing is persisted.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("exam has no parts")]
    Empty,
    #[error("part {0} appears more than once")]
    DuplicatePart(PartNumber),
    #[error("part {0} is not part of this exam")]
    UnknownPart(PartNumber),
    #[error("prompt {prompt} does not exist in part {part}")]
    UnknownPrompt { part: PartNumber, prompt: PromptId },
    #[error("option {key} is not available for prompt {prompt}")]
    UnknownOption { prompt: PromptId, key: OptionKey },
    #[error("part {part} is not a {expected:?} part")]
    WrongPartKind { part: PartNumber, expected: PartKind },
    #[error("please answer every question of part {part} before submitting")]
    Incomplete { part: PartNumber },
    #[error("exam already submitted")]
    AlreadySubmitted,
    #[error("exam not submitted yet")]
    NotSubmitted,
    #[error(transparent)]
    Pick(#[from] PickError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// True for rejections the user can fix by interacting further.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        !matches!(self, SessionError::Storage(_))
    }
}

/// Errors emitted while loading exercise content.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContentError {
    #[error("exercise has no parts")]
    NoParts,
    #[error("invalid part {part}: {source}")]
    Part {
        part: PartNumber,
        #[source]
        source: PartError,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors emitted by `AttemptService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AttemptServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
