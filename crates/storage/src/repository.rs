use async_trait::async_trait;
use exam_core::model::{Attempt, AttemptScope, UserId};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Storage identifier for a persisted attempt.
///
/// NOTE: This is `i64` to match `SQLite` row IDs.
pub type AttemptId = i64;

/// An attempt together with its storage id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRow {
    pub id: AttemptId,
    pub attempt: Attempt,
}

impl AttemptRow {
    #[must_use]
    pub fn new(id: AttemptId, attempt: Attempt) -> Self {
        Self { id, attempt }
    }
}

/// Repository contract for graded attempts. Records are append-only.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Append an attempt and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn append_attempt(&self, attempt: &Attempt) -> Result<AttemptId, StorageError>;

    /// Fetch an attempt by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_attempt(&self, id: AttemptId) -> Result<Attempt, StorageError>;

    /// All attempts of `user_id` in `scope`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_attempts(
        &self,
        user_id: UserId,
        scope: AttemptScope,
    ) -> Result<Vec<AttemptRow>, StorageError>;

    /// Newest attempt per group of `scope` (exercise, part, or theme+part),
    /// newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_latest_attempts(
        &self,
        user_id: UserId,
        scope: AttemptScope,
    ) -> Result<Vec<AttemptRow>, StorageError> {
        let rows = self.list_attempts(user_id, scope).await?;
        Ok(keep_latest_per_group(rows, scope))
    }
}

/// Keep the first row of every group; `rows` must already be newest first.
#[must_use]
pub fn keep_latest_per_group(rows: Vec<AttemptRow>, scope: AttemptScope) -> Vec<AttemptRow> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(scope.group_key(&row.attempt)))
        .collect()
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    attempts: Arc<Mutex<Vec<AttemptRow>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn append_attempt(&self, attempt: &Attempt) -> Result<AttemptId, StorageError> {
        let mut guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let id = guard.last().map_or(1, |row| row.id + 1);
        guard.push(AttemptRow::new(id, attempt.clone()));
        tracing::debug!(id, user = %attempt.user_id(), "attempt appended (memory)");
        Ok(id)
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<Attempt, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .iter()
            .find(|row| row.id == id)
            .map(|row| row.attempt.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn list_attempts(
        &self,
        user_id: UserId,
        scope: AttemptScope,
    ) -> Result<Vec<AttemptRow>, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut rows: Vec<AttemptRow> = guard
            .iter()
            .filter(|row| row.attempt.user_id() == user_id && scope.includes(&row.attempt))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.attempt
                .created_at()
                .cmp(&a.attempt.created_at())
                .then(b.id.cmp(&a.id))
        });
        Ok(rows)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub attempts: Arc<dyn AttemptRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let attempts: Arc<dyn AttemptRepository> = Arc::new(InMemoryRepository::new());
        Self { attempts }
    }
}
