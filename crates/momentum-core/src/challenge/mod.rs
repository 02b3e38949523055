mod engine;
mod question;

pub use engine::{Challenge, ChallengeSnapshot, FailureCause, Resolution, TICK};
pub use question::{blank_set, validate_set, Question, DEFAULT_QUESTION_COUNT, OPTIONS_PER_QUESTION};
