use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Number of answer options every stored question carries.
pub const OPTIONS_PER_QUESTION: usize = 4;

/// Size of the blank set offered when nothing has been saved yet.
pub const DEFAULT_QUESTION_COUNT: usize = 3;

/// One multiple-choice quiz item.
///
/// Stored as JSON with the keys `id`, `text`, `answers`, `correctAnswerIndex`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(default)]
    pub id: u32,
    #[serde(rename = "text")]
    pub prompt: String,
    #[serde(rename = "answers")]
    pub options: Vec<String>,
    #[serde(rename = "correctAnswerIndex")]
    pub correct_option_index: usize,
}

impl Question {
    pub fn new(
        id: u32,
        prompt: impl Into<String>,
        options: Vec<String>,
        correct_option_index: usize,
    ) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            options,
            correct_option_index,
        }
    }

    /// Empty template with four blank options.
    pub fn blank(id: u32) -> Self {
        Self::new(id, "", vec![String::new(); OPTIONS_PER_QUESTION], 0)
    }

    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_option_index
    }

    /// A question is complete when the prompt and all four options are filled
    /// in and the correct index points at one of them.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "text".into(),
                message: format!("question {} has no text", self.id),
            });
        }
        if self.options.len() != OPTIONS_PER_QUESTION {
            return Err(ValidationError::InvalidValue {
                field: "answers".into(),
                message: format!(
                    "question {} needs exactly {OPTIONS_PER_QUESTION} answers, got {}",
                    self.id,
                    self.options.len()
                ),
            });
        }
        if let Some(blank) = self.options.iter().position(|o| o.trim().is_empty()) {
            return Err(ValidationError::InvalidValue {
                field: "answers".into(),
                message: format!("question {} answer {} is empty", self.id, blank + 1),
            });
        }
        if self.correct_option_index >= self.options.len() {
            return Err(ValidationError::OutOfBounds {
                collection: "answers".into(),
                index: self.correct_option_index,
                len: self.options.len(),
            });
        }
        Ok(())
    }
}

/// Validate a whole question set before it is stored.
pub fn validate_set(questions: &[Question]) -> Result<(), ValidationError> {
    if questions.is_empty() {
        return Err(ValidationError::EmptyCollection("questions".into()));
    }
    questions.iter().try_for_each(Question::validate)
}

/// Blank editing template: [`DEFAULT_QUESTION_COUNT`] empty questions.
pub fn blank_set() -> Vec<Question> {
    (1..=DEFAULT_QUESTION_COUNT as u32).map(Question::blank).collect()
}
