use crate::model::{Mapping, Prompt};

/// Answered vs total prompts of one part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub answered: usize,
    pub total: usize,
}

impl Completion {
    /// Count how many of `prompts` hold an option in `mapping`.
    ///
    /// Entries for prompts outside the list are ignored.
    #[must_use]
    pub fn of(mapping: &Mapping, prompts: &[Prompt]) -> Self {
        Self {
            answered: prompts.iter().filter(|p| mapping.is_assigned(p.id)).count(),
            total: prompts.len(),
        }
    }

    /// A part with no prompts is never complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.answered == self.total
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.answered)
    }
}

/// True iff `prompts` is non-empty and every prompt has an entry in `mapping`.
#[must_use]
pub fn is_complete(mapping: &Mapping, prompts: &[Prompt]) -> bool {
    Completion::of(mapping, prompts).is_complete()
}
