use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::model::ids::{OptionKey, PartNumber, PromptId};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PartError {
    #[error("prompt {0} appears more than once")]
    DuplicatePrompt(PromptId),

    #[error("option {0} appears more than once")]
    DuplicateOption(OptionKey),

    #[error("matching part has no options to place")]
    EmptyOptionPool,

    #[error("question {0} has no options")]
    MissingLocalOptions(PromptId),
}

//
// ─── OPTIONS & PROMPTS ────────────────────────────────────────────────────────
//

/// A candidate answer: a heading in a matching part, or one key of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub key: OptionKey,
    pub text: String,
}

impl AnswerOption {
    #[must_use]
    pub fn new(key: impl Into<OptionKey>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
        }
    }
}

/// An item that needs an answer.
///
/// Multiple-choice questions carry their own `options`; paragraphs of a
/// matching part leave it empty and draw from the part's pool instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: PromptId,
    pub text: String,
    #[serde(default)]
    pub options: Vec<AnswerOption>,
}

impl Prompt {
    #[must_use]
    pub fn paragraph(id: PromptId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            options: Vec::new(),
        }
    }

    #[must_use]
    pub fn question(id: PromptId, text: impl Into<String>, options: Vec<AnswerOption>) -> Self {
        Self {
            id,
            text: text.into(),
            options,
        }
    }

    #[must_use]
    pub fn has_option(&self, key: &OptionKey) -> bool {
        self.options.iter().any(|o| &o.key == key)
    }
}

//
// ─── ANSWER KEY ───────────────────────────────────────────────────────────────
//

/// Authoritative prompt -> option mapping used for grading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerKey(BTreeMap<PromptId, OptionKey>);

impl AnswerKey {
    #[must_use]
    pub fn new(entries: BTreeMap<PromptId, OptionKey>) -> Self {
        Self(entries)
    }

    #[must_use]
    pub fn get(&self, prompt: PromptId) -> Option<&OptionKey> {
        self.0.get(&prompt)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PromptId, &OptionKey)> {
        self.0.iter().map(|(p, k)| (*p, k))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(PromptId, OptionKey)> for AnswerKey {
    fn from_iter<T: IntoIterator<Item = (PromptId, OptionKey)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

//
// ─── PART ─────────────────────────────────────────────────────────────────────
//

/// How options relate to prompts within a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartKind {
    /// Each option from a shared pool may be placed on at most one prompt.
    Matching,
    /// Each prompt picks independently from its own local options.
    MultipleChoice,
}

/// One part of an exam: its prompts, options and (optionally) the answer key.
///
/// Loaded once per exercise view and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    number: PartNumber,
    kind: PartKind,
    title: String,
    prompts: Vec<Prompt>,
    options: Vec<AnswerOption>,
    answer_key: Option<AnswerKey>,
    passage: Option<String>,
    photo: Option<String>,
}

impl Part {
    /// Build a matching part with a shared option pool.
    ///
    /// # Errors
    ///
    /// Returns `PartError` on duplicate prompt ids or option keys, or an empty pool.
    pub fn matching(
        number: PartNumber,
        title: impl Into<String>,
        prompts: Vec<Prompt>,
        options: Vec<AnswerOption>,
        answer_key: Option<AnswerKey>,
    ) -> Result<Self, PartError> {
        check_unique_prompts(&prompts)?;
        check_unique_options(&options)?;
        if options.is_empty() && !prompts.is_empty() {
            return Err(PartError::EmptyOptionPool);
        }
        Ok(Self {
            number,
            kind: PartKind::Matching,
            title: title.into(),
            prompts,
            options,
            answer_key,
            passage: None,
            photo: None,
        })
    }

    /// Build a multiple-choice part; every prompt brings its own options.
    ///
    /// # Errors
    ///
    /// Returns `PartError` on duplicate prompt ids, duplicate keys within a
    /// question, or a question without options.
    pub fn multiple_choice(
        number: PartNumber,
        title: impl Into<String>,
        prompts: Vec<Prompt>,
        answer_key: Option<AnswerKey>,
    ) -> Result<Self, PartError> {
        check_unique_prompts(&prompts)?;
        for prompt in &prompts {
            if prompt.options.is_empty() {
                return Err(PartError::MissingLocalOptions(prompt.id));
            }
            check_unique_options(&prompt.options)?;
        }
        Ok(Self {
            number,
            kind: PartKind::MultipleChoice,
            title: title.into(),
            prompts,
            options: Vec::new(),
            answer_key,
            passage: None,
            photo: None,
        })
    }

    /// Attach the reading text the questions refer to.
    #[must_use]
    pub fn with_passage(mut self, passage: impl Into<String>) -> Self {
        self.passage = Some(passage.into());
        self
    }

    /// Attach an illustration, by file name or URL.
    #[must_use]
    pub fn with_photo(mut self, photo: impl Into<String>) -> Self {
        self.photo = Some(photo.into());
        self
    }

    #[must_use]
    pub fn number(&self) -> PartNumber {
        self.number
    }

    #[must_use]
    pub fn kind(&self) -> PartKind {
        self.kind
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn prompts(&self) -> &[Prompt] {
        &self.prompts
    }

    /// Shared option pool. Empty for multiple-choice parts.
    #[must_use]
    pub fn options(&self) -> &[AnswerOption] {
        &self.options
    }

    #[must_use]
    pub fn passage(&self) -> Option<&str> {
        self.passage.as_deref()
    }

    #[must_use]
    pub fn photo(&self) -> Option<&str> {
        self.photo.as_deref()
    }

    #[must_use]
    pub fn answer_key(&self) -> Option<&AnswerKey> {
        self.answer_key.as_ref()
    }

    #[must_use]
    pub fn prompt(&self, id: PromptId) -> Option<&Prompt> {
        self.prompts.iter().find(|p| p.id == id)
    }

    /// Whether `key` is a legal answer for `prompt` in this part.
    #[must_use]
    pub fn accepts(&self, prompt: PromptId, key: &OptionKey) -> bool {
        match self.kind {
            PartKind::Matching => {
                self.prompt(prompt).is_some() && self.options.iter().any(|o| &o.key == key)
            }
            PartKind::MultipleChoice => self.prompt(prompt).is_some_and(|p| p.has_option(key)),
        }
    }

    /// Text of an option, looked up in the pool or the prompt's local set.
    #[must_use]
    pub fn option_text(&self, prompt: PromptId, key: &OptionKey) -> Option<&str> {
        let local = self.prompt(prompt).map(|p| p.options.as_slice()).unwrap_or_default();
        self.options
            .iter()
            .chain(local)
            .find(|o| &o.key == key)
            .map(|o| o.text.as_str())
    }
}

fn check_unique_prompts(prompts: &[Prompt]) -> Result<(), PartError> {
    let mut seen = BTreeSet::new();
    for prompt in prompts {
        if !seen.insert(prompt.id) {
            return Err(PartError::DuplicatePrompt(prompt.id));
        }
    }
    Ok(())
}

fn check_unique_options(options: &[AnswerOption]) -> Result<(), PartError> {
    let mut seen = BTreeSet::new();
    for option in options {
        if !seen.insert(&option.key) {
            return Err(PartError::DuplicateOption(option.key.clone()));
        }
    }
    Ok(())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn headings() -> Vec<AnswerOption> {
        vec![AnswerOption::new("A", "Weather"), AnswerOption::new("B", "Sports")]
    }

    #[test]
    fn matching_part_rejects_duplicate_prompts() {
        let prompts = vec![
            Prompt::paragraph(PromptId::new(1), "one"),
            Prompt::paragraph(PromptId::new(1), "again"),
        ];
        let err = Part::matching(PartNumber::new(1), "T", prompts, headings(), None).unwrap_err();
        assert_eq!(err, PartError::DuplicatePrompt(PromptId::new(1)));
    }

    #[test]
    fn matching_part_rejects_duplicate_options() {
        let options = vec![AnswerOption::new("A", "x"), AnswerOption::new("A", "y")];
        let err = Part::matching(PartNumber::new(1), "T", Vec::new(), options, None).unwrap_err();
        assert_eq!(err, PartError::DuplicateOption(OptionKey::new("A")));
    }

    #[test]
    fn choice_part_requires_local_options() {
        let prompts = vec![Prompt::question(PromptId::new(6), "Why?", Vec::new())];
        let err = Part::multiple_choice(PartNumber::new(2), "T", prompts, None).unwrap_err();
        assert_eq!(err, PartError::MissingLocalOptions(PromptId::new(6)));
    }

    #[test]
    fn accepts_checks_pool_or_local_options() {
        let matching = Part::matching(
            PartNumber::new(1),
            "T",
            vec![Prompt::paragraph(PromptId::new(1), "p")],
            headings(),
            None,
        )
        .unwrap();
        assert!(matching.accepts(PromptId::new(1), &OptionKey::new("B")));
        assert!(!matching.accepts(PromptId::new(1), &OptionKey::new("Z")));
        assert!(!matching.accepts(PromptId::new(9), &OptionKey::new("A")));

        let choice = Part::multiple_choice(
            PartNumber::new(2),
            "T",
            vec![Prompt::question(
                PromptId::new(6),
                "Q",
                vec![AnswerOption::new("a", "yes"), AnswerOption::new("b", "no")],
            )],
            None,
        )
        .unwrap();
        assert!(choice.accepts(PromptId::new(6), &OptionKey::new("b")));
        assert!(!choice.accepts(PromptId::new(6), &OptionKey::new("c")));
        assert_eq!(choice.option_text(PromptId::new(6), &OptionKey::new("a")), Some("yes"));
    }

    #[test]
    fn reading_material_is_optional() {
        let prompts = vec![Prompt::paragraph(PromptId::new(1), "p")];
        let plain = Part::matching(PartNumber::new(1), "T", prompts, headings(), None).unwrap();
        assert_eq!(plain.passage(), None);
        assert_eq!(plain.photo(), None);

        let illustrated = plain.with_photo("cover.jpg").with_passage("Long text");
        assert_eq!(illustrated.photo(), Some("cover.jpg"));
        assert_eq!(illustrated.passage(), Some("Long text"));
        assert_eq!(illustrated.kind(), PartKind::Matching);
    }
}
