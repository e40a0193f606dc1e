use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use exam_core::model::Attempt;
use storage::repository::{AttemptId, AttemptRepository, AttemptRow, StorageError};

/// Default number of unsaved attempts kept for retry.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 32;

/// Outcome of one `AttemptOutbox::flush`.
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Attempts saved by this flush with their new ids, in queue order.
    pub saved: Vec<AttemptRow>,
    /// Attempts still waiting after the flush.
    pub remaining: usize,
    /// The error that stopped the flush, if any.
    pub error: Option<StorageError>,
}

impl FlushReport {
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.remaining == 0 && self.error.is_none()
    }

    #[must_use]
    pub fn saved_ids(&self) -> Vec<AttemptId> {
        self.saved.iter().map(|row| row.id).collect()
    }
}

/// Bounded FIFO of attempts whose save failed.
///
/// When full, pushing drops the oldest entry. `flush` retries in order and
/// stops at the first failure so older attempts are always saved first.
#[derive(Debug)]
pub struct AttemptOutbox {
    capacity: usize,
    queue: Mutex<VecDeque<Attempt>>,
}

impl AttemptOutbox {
    /// A capacity of zero is bumped to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Queue `attempt`; returns the attempt dropped to make room, if any.
    pub fn push(&self, attempt: Attempt) -> Option<Attempt> {
        let mut queue = self.lock();
        let dropped = if queue.len() >= self.capacity {
            queue.pop_front()
        } else {
            None
        };
        if let Some(old) = &dropped {
            self.warn_dropped(old);
        }
        queue.push_back(attempt);
        dropped
    }

    /// Retry every queued attempt against `repo`, oldest first.
    pub async fn flush(&self, repo: &dyn AttemptRepository) -> FlushReport {
        let mut report = FlushReport::default();
        loop {
            // The lock is released before awaiting the repository.
            let Some(attempt) = self.lock().pop_front() else {
                break;
            };
            match repo.append_attempt(&attempt).await {
                Ok(id) => report.saved.push(AttemptRow::new(id, attempt)),
                Err(error) => {
                    tracing::warn!(%error, "outbox flush stopped");
                    self.requeue(attempt);
                    report.error = Some(error);
                    break;
                }
            }
        }
        report.remaining = self.len();
        if !report.saved.is_empty() {
            tracing::info!(
                saved = report.saved.len(),
                remaining = report.remaining,
                "outbox flushed"
            );
        }
        report
    }

    /// Put a failed attempt back at the head. Pushes made while the save was
    /// in flight may have filled the queue; the oldest entries go first.
    fn requeue(&self, attempt: Attempt) {
        let mut queue = self.lock();
        queue.push_front(attempt);
        while queue.len() > self.capacity {
            if let Some(old) = queue.pop_front() {
                self.warn_dropped(&old);
            }
        }
    }

    fn warn_dropped(&self, old: &Attempt) {
        tracing::warn!(
            user = %old.user_id(),
            exercise = %old.exercise_id(),
            capacity = self.capacity,
            "attempt outbox full, dropping oldest attempt"
        );
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Attempt>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AttemptOutbox {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOX_CAPACITY)
    }
}
