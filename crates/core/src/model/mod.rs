mod attempt;
mod ids;
mod mapping;
mod part;

pub use ids::{ExerciseId, OptionKey, ParseIdError, PartId, PartNumber, PromptId, ThemeId, UserId};

pub use attempt::{Attempt, AttemptError, AttemptScope, POINTS_PER_QUESTION, Score};
pub use mapping::Mapping;
pub use part::{AnswerKey, AnswerOption, Part, PartError, PartKind, Prompt};
