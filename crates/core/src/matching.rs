//! One-to-one matching of pool options onto prompts.
//!
//! `Assignments` is the store: a forward `Mapping` plus an option -> prompt
//! index kept in step with it, so "who holds this option" never needs a
//! scan. `MatchingBoard` layers the click and drag interactions (including
//! the single focused prompt) on top of it.
//!
//! Every operation is a pure transformation returning a new value.

use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::{Mapping, OptionKey, PromptId};

//
// ─── ASSIGNMENTS ──────────────────────────────────────────────────────────────
//

/// Prompt -> option mapping in which no option is held by two prompts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignments {
    mapping: Mapping,
    holders: BTreeMap<OptionKey, PromptId>,
}

impl Assignments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a plain mapping, assigning in prompt order.
    ///
    /// If the input repeats an option, the highest prompt keeps it.
    #[must_use]
    pub fn from_mapping(mapping: &Mapping) -> Self {
        mapping
            .iter()
            .fold(Self::new(), |acc, (prompt, key)| acc.assign(prompt, key.clone()))
    }

    #[must_use]
    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    #[must_use]
    pub fn get(&self, prompt: PromptId) -> Option<&OptionKey> {
        self.mapping.get(prompt)
    }

    /// Prompt currently holding `key`, if any.
    #[must_use]
    pub fn holder_of(&self, key: &OptionKey) -> Option<PromptId> {
        self.holders.get(key).copied()
    }

    /// An option can be picked from the pool iff no prompt holds it.
    #[must_use]
    pub fn is_available(&self, key: &OptionKey) -> bool {
        !self.holders.contains_key(key)
    }

    /// Place `key` on `prompt`.
    ///
    /// A different prompt holding `key` loses it in the same step. Assigning
    /// the pair that is already in place returns an identical value.
    #[must_use]
    pub fn assign(&self, prompt: PromptId, key: OptionKey) -> Self {
        if self.mapping.get(prompt) == Some(&key) {
            return self.clone();
        }

        let mut next = self.clone();
        match next.holders.remove(&key) {
            Some(holder) if holder != prompt => {
                next.mapping.unset(holder);
            }
            _ => {}
        }
        if let Some(previous) = next.mapping.set(prompt, key.clone()) {
            next.holders.remove(&previous);
        }
        next.holders.insert(key, prompt);
        next
    }

    /// Make `prompt` absent. Other prompts are untouched.
    #[must_use]
    pub fn clear(&self, prompt: PromptId) -> Self {
        if !self.mapping.is_assigned(prompt) {
            return self.clone();
        }
        let mut next = self.clone();
        if let Some(previous) = next.mapping.unset(prompt) {
            next.holders.remove(&previous);
        }
        next
    }

    /// Drag a placed option from one prompt onto another.
    ///
    /// Same as `clear(from)` followed by `assign(to, key)`, except that
    /// `from == to` changes nothing.
    #[must_use]
    pub fn move_between(&self, from: PromptId, to: PromptId, key: OptionKey) -> Self {
        if from == to {
            return self.clone();
        }
        self.clear(from).assign(to, key)
    }

    /// Every prompt becomes absent.
    #[must_use]
    pub fn reset_all(&self) -> Self {
        Self::new()
    }

    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        self.holders.len() == self.mapping.len()
            && self
                .mapping
                .iter()
                .all(|(prompt, key)| self.holders.get(key) == Some(&prompt))
    }
}

//
// ─── BOARD (focus + drag/drop) ────────────────────────────────────────────────
//

/// Reasons a pick from the option pool is refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PickError {
    #[error("option {key} is already placed on prompt {holder}")]
    AlreadyPlaced { key: OptionKey, holder: PromptId },

    #[error("no prompt is focused")]
    NoFocusedPrompt,
}

/// Matching part interaction state: assignments plus at most one focused prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchingBoard {
    assignments: Assignments,
    focused: Option<PromptId>,
}

impl MatchingBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn assignments(&self) -> &Assignments {
        &self.assignments
    }

    #[must_use]
    pub fn mapping(&self) -> &Mapping {
        self.assignments.mapping()
    }

    #[must_use]
    pub fn focused(&self) -> Option<PromptId> {
        self.focused
    }

    /// Click on a prompt's slot.
    ///
    /// A filled slot is emptied (focus untouched). An empty slot toggles
    /// focus: it becomes the focused prompt, or loses focus if it already was.
    #[must_use]
    pub fn click_prompt(&self, prompt: PromptId) -> Self {
        if self.assignments.get(prompt).is_some() {
            return Self {
                assignments: self.assignments.clear(prompt),
                focused: self.focused,
            };
        }

        let focused = if self.focused == Some(prompt) {
            None
        } else {
            Some(prompt)
        };
        Self {
            assignments: self.assignments.clone(),
            focused,
        }
    }

    /// Click on an option in the pool.
    ///
    /// # Errors
    ///
    /// Returns `PickError::AlreadyPlaced` if the option is on some prompt, or
    /// `PickError::NoFocusedPrompt` if nothing is focused. State is unchanged
    /// in both cases.
    pub fn click_option(&self, key: OptionKey) -> Result<Self, PickError> {
        if let Some(holder) = self.assignments.holder_of(&key) {
            return Err(PickError::AlreadyPlaced { key, holder });
        }
        let prompt = self.focused.ok_or(PickError::NoFocusedPrompt)?;
        Ok(Self {
            assignments: self.assignments.assign(prompt, key),
            focused: None,
        })
    }

    /// Drop an option dragged out of the pool onto a prompt.
    #[must_use]
    pub fn drop_from_pool(&self, prompt: PromptId, key: OptionKey) -> Self {
        Self {
            assignments: self.assignments.assign(prompt, key),
            focused: None,
        }
    }

    /// Drop an option dragged from prompt `from` onto prompt `to`.
    #[must_use]
    pub fn drop_from_prompt(&self, from: PromptId, to: PromptId, key: OptionKey) -> Self {
        Self {
            assignments: self.assignments.move_between(from, to, key),
            focused: None,
        }
    }

    /// Drop an option dragged from prompt `from` back onto the pool.
    #[must_use]
    pub fn drop_on_pool(&self, from: PromptId) -> Self {
        Self {
            assignments: self.assignments.clear(from),
            focused: self.focused,
        }
    }

    /// Assign directly, e.g. when replaying saved answers.
    #[must_use]
    pub fn assign(&self, prompt: PromptId, key: OptionKey) -> Self {
        Self {
            assignments: self.assignments.assign(prompt, key),
            focused: self.focused,
        }
    }

    #[must_use]
    pub fn reset_all(&self) -> Self {
        Self {
            assignments: self.assignments.reset_all(),
            focused: self.focused,
        }
    }

    #[must_use]
    pub fn without_focus(&self) -> Self {
        Self {
            assignments: self.assignments.clone(),
            focused: None,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
