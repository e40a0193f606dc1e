use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::attempt_service::AttemptService;
use crate::error::AppServicesError;
use crate::exam::ExamLoopService;
use crate::outbox::AttemptOutbox;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    exam_loop: Arc<ExamLoopService>,
    attempts: Arc<AttemptService>,
    outbox: Arc<AttemptOutbox>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        points_per_question: u32,
        outbox_capacity: usize,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(
            &storage,
            clock,
            points_per_question,
            outbox_capacity,
        ))
    }

    #[must_use]
    pub fn from_storage(
        storage: &Storage,
        clock: Clock,
        points_per_question: u32,
        outbox_capacity: usize,
    ) -> Self {
        let outbox = Arc::new(AttemptOutbox::new(outbox_capacity));
        let exam_loop = Arc::new(
            ExamLoopService::new(clock, Arc::clone(&storage.attempts))
                .with_points_per_question(points_per_question)
                .with_outbox(Arc::clone(&outbox)),
        );
        let attempts = Arc::new(AttemptService::new(Arc::clone(&storage.attempts)));
        Self {
            exam_loop,
            attempts,
            outbox,
        }
    }

    #[must_use]
    pub fn exam_loop(&self) -> Arc<ExamLoopService> {
        Arc::clone(&self.exam_loop)
    }

    #[must_use]
    pub fn attempts(&self) -> Arc<AttemptService> {
        Arc::clone(&self.attempts)
    }

    #[must_use]
    pub fn outbox(&self) -> Arc<AttemptOutbox> {
        Arc::clone(&self.outbox)
    }
}
