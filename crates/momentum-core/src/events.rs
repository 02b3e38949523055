use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::challenge::FailureCause;
use crate::notify::NotifyOutcome;

/// Every state change in the engine produces an Event.
/// Front ends subscribe to them; the session actor is the only writer
/// for challenge events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    AlarmArmed {
        fires_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    AlarmDisarmed {
        at: DateTime<Utc>,
    },
    /// Arming was refused; the alarm has been switched back off.
    AlarmPermissionDenied {
        at: DateTime<Utc>,
    },
    AlarmFired {
        fires_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    ChallengeStarted {
        challenge_id: Uuid,
        questions: usize,
        deadline: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// The challenge could not be entered (no question set).
    ChallengeAborted {
        reason: String,
        at: DateTime<Utc>,
    },
    QuestionPresented {
        index: usize,
        total: usize,
        prompt: String,
        options: Vec<String>,
        correct_streak: usize,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    AnswerJudged {
        index: usize,
        option: usize,
        correct: bool,
        correct_streak: usize,
        next_index: usize,
        at: DateTime<Utc>,
    },
    ChallengeTick {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    ChallengeSucceeded {
        challenge_id: Uuid,
        correct_answers: u32,
        restarts: u32,
        at: DateTime<Utc>,
    },
    ChallengeFailed {
        challenge_id: Uuid,
        cause: FailureCause,
        correct_answers: u32,
        restarts: u32,
        at: DateTime<Utc>,
    },
    /// Result of the single failure notification attempt.
    NotificationFinished {
        outcome: NotifyOutcome,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// True for the two events that end a challenge.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Event::ChallengeSucceeded { .. } | Event::ChallengeFailed { .. }
        )
    }
}
