use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::ids::{OptionKey, PromptId};

/// Current prompt -> option assignment for one part.
///
/// A prompt without an entry is "absent". Values are immutable: every
/// transformation returns a new `Mapping` and leaves the receiver untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mapping(BTreeMap<PromptId, OptionKey>);

impl Mapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, prompt: PromptId) -> Option<&OptionKey> {
        self.0.get(&prompt)
    }

    #[must_use]
    pub fn is_assigned(&self, prompt: PromptId) -> bool {
        self.0.contains_key(&prompt)
    }

    /// Returns a copy with `prompt` set to `key`.
    #[must_use]
    pub fn with(&self, prompt: PromptId, key: OptionKey) -> Self {
        let mut next = self.clone();
        next.set(prompt, key);
        next
    }

    /// Returns a copy with `prompt` absent.
    #[must_use]
    pub fn without(&self, prompt: PromptId) -> Self {
        let mut next = self.clone();
        next.unset(prompt);
        next
    }

    // In-place edits stay crate-private; the stores only apply them to
    // their own fresh copy.
    pub(crate) fn set(&mut self, prompt: PromptId, key: OptionKey) -> Option<OptionKey> {
        self.0.insert(prompt, key)
    }

    pub(crate) fn unset(&mut self, prompt: PromptId) -> Option<OptionKey> {
        self.0.remove(&prompt)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PromptId, &OptionKey)> {
        self.0.iter().map(|(p, k)| (*p, k))
    }

    /// Number of prompts holding an option.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(PromptId, OptionKey)> for Mapping {
    fn from_iter<T: IntoIterator<Item = (PromptId, OptionKey)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
