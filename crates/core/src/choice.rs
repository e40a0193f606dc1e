//! Many-to-one multiple choice: each prompt picks from its own options,
//! so there is no exclusivity across prompts.

use crate::model::{Mapping, OptionKey, PromptId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Choices {
    mapping: Mapping,
}

impl Choices {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// Overwrite the prompt's choice.
    #[must_use]
    pub fn select(&self, prompt: PromptId, key: OptionKey) -> Self {
        Self {
            mapping: self.mapping.with(prompt, key),
        }
    }

    #[must_use]
    pub fn reset_all(&self) -> Self {
        Self::new()
    }
}
