//! Exercise documents as they are stored on disk or served by the content API.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use exam_core::model::{
    AnswerKey, AnswerOption, ExerciseId, OptionKey, Part, PartId, PartNumber, Prompt, PromptId,
    ThemeId, UserId,
};

use super::session::AttemptTracking;
use crate::error::ContentError;

#[derive(Debug, Deserialize)]
struct ExerciseDocument {
    exercise_id: ExerciseId,
    part_id: PartId,
    #[serde(default)]
    theme_id: Option<ThemeId>,
    title: String,
    parts: BTreeMap<PartNumber, PartDocument>,
}

#[derive(Debug, Deserialize)]
struct PartDocument {
    content: PartContent,
    #[serde(default)]
    solution: Option<BTreeMap<PromptId, OptionKey>>,
}

/// The shape of the content decides the part kind.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PartContent {
    Choice(ChoiceContent),
    Matching(MatchingContent),
}

#[derive(Debug, Deserialize)]
struct MatchingContent {
    title: String,
    #[serde(default)]
    photo: Option<String>,
    headings: Vec<HeadingDoc>,
    paragraphs: Vec<ParagraphDoc>,
}

#[derive(Debug, Deserialize)]
struct HeadingDoc {
    id: OptionKey,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ParagraphDoc {
    id: PromptId,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ChoiceContent {
    title: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    photo: Option<String>,
    questions: Vec<QuestionDoc>,
}

#[derive(Debug, Deserialize)]
struct QuestionDoc {
    id: PromptId,
    question: String,
    options: BTreeMap<OptionKey, String>,
}

/// A loaded exercise: identifiers plus validated parts, ordered by number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamContent {
    pub exercise_id: ExerciseId,
    pub part_id: PartId,
    pub theme_id: Option<ThemeId>,
    pub title: String,
    pub parts: Vec<Part>,
}

impl ExamContent {
    /// Parse an exercise document.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::Json` for malformed documents, `NoParts` for an
    /// empty part list and `Part` when a part fails validation.
    pub fn from_json(json: &str) -> Result<Self, ContentError> {
        let doc: ExerciseDocument = serde_json::from_str(json)?;
        if doc.parts.is_empty() {
            return Err(ContentError::NoParts);
        }

        let mut parts = Vec::with_capacity(doc.parts.len());
        for (number, part) in doc.parts {
            let answer_key = part.solution.map(|s| s.into_iter().collect::<AnswerKey>());
            let built = match part.content {
                PartContent::Matching(content) => {
                    let prompts = content
                        .paragraphs
                        .into_iter()
                        .map(|p| Prompt::paragraph(p.id, p.text))
                        .collect();
                    let options = content
                        .headings
                        .into_iter()
                        .map(|h| AnswerOption::new(h.id, h.text))
                        .collect();
                    Part::matching(number, content.title, prompts, options, answer_key)
                        .map(|part| with_material(part, None, content.photo))
                }
                PartContent::Choice(content) => {
                    let prompts = content
                        .questions
                        .into_iter()
                        .map(|q| {
                            let options = q
                                .options
                                .into_iter()
                                .map(|(key, text)| AnswerOption::new(key, text))
                                .collect();
                            Prompt::question(q.id, q.question, options)
                        })
                        .collect();
                    Part::multiple_choice(number, content.title, prompts, answer_key)
                        .map(|part| with_material(part, content.text, content.photo))
                }
            };
            parts.push(built.map_err(|source| ContentError::Part {
                part: number,
                source,
            })?);
        }

        tracing::debug!(
            exercise = %doc.exercise_id,
            parts = parts.len(),
            "exercise content loaded"
        );

        Ok(Self {
            exercise_id: doc.exercise_id,
            part_id: doc.part_id,
            theme_id: doc.theme_id,
            title: doc.title,
            parts,
        })
    }

    /// Read and parse an exercise document from disk.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::Io` if the file cannot be read, otherwise as
    /// `from_json`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ContentError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Identifiers for persisting `user`'s attempt at this exercise.
    #[must_use]
    pub fn tracking(&self, user_id: UserId) -> AttemptTracking {
        AttemptTracking {
            user_id,
            exercise_id: self.exercise_id,
            part_id: self.part_id,
            theme_id: self.theme_id,
        }
    }

    /// Practice exercises are not part of a theme.
    #[must_use]
    pub fn is_practice(&self) -> bool {
        self.theme_id.is_none()
    }
}

fn with_material(part: Part, passage: Option<String>, photo: Option<String>) -> Part {
    let part = match passage {
        Some(text) => part.with_passage(text),
        None => part,
    };
    match photo {
        Some(photo) => part.with_photo(photo),
        None => part,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::PartKind;

    const EXERCISE: &str = r#"{
        "exercise_id": 12,
        "part_id": 1,
        "theme_id": 3,
        "title": "Leseverstehen",
        "parts": {
            "1": {
                "content": {
                    "title": "Teil 1",
                    "photo": "cover.jpg",
                    "headings": [
                        {"id": "A", "text": "Ein neues Hobby"},
                        {"id": "B", "text": "Reisen im Winter"},
                        {"id": "C", "text": "Kochen mit Kindern"}
                    ],
                    "paragraphs": [
                        {"id": 1, "text": "Seit einem Jahr ..."},
                        {"id": 2, "text": "Im Dezember ..."}
                    ]
                },
                "solution": {"1": "A", "2": "B"}
            },
            "2": {
                "content": {
                    "title": "Teil 2",
                    "text": "Ein langer Artikel ...",
                    "questions": [
                        {"id": 6, "question": "Was ...?", "options": {"a": "x", "b": "y", "c": "z"}}
                    ]
                }
            }
        }
    }"#;

    #[test]
    fn parses_both_part_shapes() {
        let content = ExamContent::from_json(EXERCISE).unwrap();
        assert_eq!(content.exercise_id, ExerciseId::new(12));
        assert_eq!(content.theme_id, Some(ThemeId::new(3)));
        assert!(!content.is_practice());
        assert_eq!(content.parts.len(), 2);

        let matching = &content.parts[0];
        assert_eq!(matching.kind(), PartKind::Matching);
        assert_eq!(matching.options().len(), 3);
        assert_eq!(matching.photo(), Some("cover.jpg"));
        assert_eq!(matching.passage(), None);
        assert_eq!(
            matching.answer_key().unwrap().get(PromptId::new(2)),
            Some(&OptionKey::new("B"))
        );

        let choice = &content.parts[1];
        assert_eq!(choice.kind(), PartKind::MultipleChoice);
        assert!(choice.answer_key().is_none());
        assert_eq!(choice.passage(), Some("Ein langer Artikel ..."));
        assert_eq!(choice.photo(), None);
        assert!(choice.accepts(PromptId::new(6), &OptionKey::new("c")));
    }

    #[test]
    fn missing_theme_means_practice() {
        let json = r#"{
            "exercise_id": 1, "part_id": 1, "title": "x",
            "parts": {"1": {"content": {"title": "t", "headings": [{"id": "A", "text": "h"}],
                "paragraphs": [{"id": 1, "text": "p"}]}}}
        }"#;
        let content = ExamContent::from_json(json).unwrap();
        assert!(content.is_practice());
        let tracking = content.tracking(UserId::random());
        assert_eq!(tracking.theme_id, None);
    }

    #[test]
    fn invalid_part_reports_its_number() {
        let json = r#"{
            "exercise_id": 1, "part_id": 1, "title": "x",
            "parts": {"4": {"content": {"title": "t", "headings": [{"id": "A", "text": "h"}, {"id": "A", "text": "h2"}],
                "paragraphs": [{"id": 1, "text": "p"}]}}}
        }"#;
        let err = ExamContent::from_json(json).unwrap_err();
        assert!(matches!(err, ContentError::Part { part, .. } if part == PartNumber::new(4)));
    }

    #[test]
    fn empty_parts_are_rejected() {
        let json = r#"{"exercise_id": 1, "part_id": 1, "title": "x", "parts": {}}"#;
        assert!(matches!(
            ExamContent::from_json(json),
            Err(ContentError::NoParts)
        ));
    }
}
