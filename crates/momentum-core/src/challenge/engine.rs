//! Challenge state machine.
//!
//! Like the rest of the engine it has no internal thread: the session actor
//! calls `tick()` once per second and forwards answers as they arrive.
//!
//! ## State Transitions
//!
//! ```text
//! Pending -> Success   (every item answered correctly in one unbroken run)
//! Pending -> Failure   (countdown reached zero, or the safety net fired)
//! ```
//!
//! Terminal states absorb every later tick, answer and safety-net signal.
//! A wrong answer anywhere sends the run back to item 0; the countdown keeps
//! going.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::question::Question;
use crate::error::{CoreError, ValidationError};
use crate::events::Event;

/// Granularity of the internal countdown.
pub const TICK: std::time::Duration = std::time::Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Pending,
    Success,
    Failure,
}

impl Resolution {
    pub fn is_terminal(self) -> bool {
        self != Resolution::Pending
    }
}

/// What forced a challenge into failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// The challenge's own countdown ran out.
    Timeout,
    /// The dispatcher's redundant deadline timer got there first.
    SafetyNet,
}

/// Serializable view of a running challenge for front ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeSnapshot {
    pub challenge_id: Uuid,
    /// 1-based question number.
    pub question_number: usize,
    pub total: usize,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_streak: usize,
    pub remaining_secs: u64,
    pub feedback_pending: bool,
    pub state: Resolution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    id: Uuid,
    items: Vec<Question>,
    current_index: usize,
    correct_streak: usize,
    /// Total correct answers, across restarts.
    correct_answers: u32,
    /// Wrong answers that sent the run back to item 0.
    restarts: u32,
    started_at: DateTime<Utc>,
    deadline: DateTime<Utc>,
    remaining_secs: u64,
    /// Set after an answer until the front end has shown the verdict.
    feedback_pending: bool,
    resolved: Resolution,
}

impl Challenge {
    /// Start a challenge over `items` with a countdown of `duration`.
    ///
    /// # Errors
    /// `ChallengeDataMissing` when `items` is empty.
    pub fn start(items: Vec<Question>, duration: std::time::Duration) -> Result<Self, CoreError> {
        if items.is_empty() {
            return Err(CoreError::ChallengeDataMissing);
        }
        let budget = chrono::Duration::from_std(duration).map_err(|_| {
            ValidationError::InvalidValue {
                field: "deadline".into(),
                message: format!("{duration:?} is out of range"),
            }
        })?;
        let started_at = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            items,
            current_index: 0,
            correct_streak: 0,
            correct_answers: 0,
            restarts: 0,
            started_at,
            deadline: started_at + budget,
            remaining_secs: duration.as_secs(),
            feedback_pending: false,
            resolved: Resolution::Pending,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn resolution(&self) -> Resolution {
        self.resolved
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_terminal()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.items.get(self.current_index)
    }

    pub fn correct_streak(&self) -> usize {
        self.correct_streak
    }

    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    pub fn is_feedback_pending(&self) -> bool {
        self.feedback_pending
    }

    pub fn snapshot(&self) -> ChallengeSnapshot {
        let question = self.current_question();
        ChallengeSnapshot {
            challenge_id: self.id,
            question_number: self.current_index + 1,
            total: self.items.len(),
            prompt: question.map(|q| q.prompt.clone()).unwrap_or_default(),
            options: question.map(|q| q.options.clone()).unwrap_or_default(),
            correct_streak: self.correct_streak,
            remaining_secs: self.remaining_secs,
            feedback_pending: self.feedback_pending,
            state: self.resolved,
        }
    }

    /// Event describing the question the user should see now.
    /// `None` once resolved or while a verdict is still on screen.
    pub fn present(&self) -> Option<Event> {
        if self.is_resolved() || self.feedback_pending {
            return None;
        }
        let question = self.current_question()?;
        Some(Event::QuestionPresented {
            index: self.current_index,
            total: self.items.len(),
            prompt: question.prompt.clone(),
            options: question.options.clone(),
            correct_streak: self.correct_streak,
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Count down one [`TICK`]. Returns `Some(Event::ChallengeFailed)` exactly
    /// once, on the tick that exhausts the budget.
    pub fn tick(&mut self) -> Option<Event> {
        if self.is_resolved() {
            return None;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(TICK.as_secs());
        if self.remaining_secs == 0 {
            return Some(self.fail(FailureCause::Timeout));
        }
        None
    }

    /// Safety-net path: fail if still pending, otherwise do nothing.
    pub fn force_failure(&mut self) -> Option<Event> {
        if self.is_resolved() {
            return None;
        }
        Some(self.fail(FailureCause::SafetyNet))
    }

    /// Submit an answer for the current item.
    ///
    /// Ignored once resolved or while the previous verdict is still pending
    /// acknowledgement.
    pub fn answer(&mut self, option: usize) -> Option<Event> {
        if self.is_resolved() || self.feedback_pending {
            return None;
        }
        let index = self.current_index;
        let correct = self.items.get(index)?.is_correct(option);

        if correct {
            self.correct_streak += 1;
            self.correct_answers += 1;
            if self.correct_streak == self.items.len() {
                self.resolved = Resolution::Success;
                return Some(Event::ChallengeSucceeded {
                    challenge_id: self.id,
                    correct_answers: self.correct_answers,
                    restarts: self.restarts,
                    at: Utc::now(),
                });
            }
            self.current_index += 1;
        } else {
            self.current_index = 0;
            self.correct_streak = 0;
            self.restarts += 1;
        }
        self.feedback_pending = true;

        Some(Event::AnswerJudged {
            index,
            option,
            correct,
            correct_streak: self.correct_streak,
            next_index: self.current_index,
            at: Utc::now(),
        })
    }

    /// The verdict has been shown; accept the next answer.
    /// Returns whether a verdict was actually pending.
    pub fn acknowledge(&mut self) -> bool {
        std::mem::replace(&mut self.feedback_pending, false)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn fail(&mut self, cause: FailureCause) -> Event {
        self.resolved = Resolution::Failure;
        self.remaining_secs = 0;
        self.feedback_pending = false;
        Event::ChallengeFailed {
            challenge_id: self.id,
            cause,
            correct_answers: self.correct_answers,
            restarts: self.restarts,
            at: Utc::now(),
        }
    }
}
