//! User settings on top of a string key-value store.
//!
//! Keys and value formats match what the app has always stored, so an
//! existing settings database keeps working. Reads never fail: a missing or
//! unreadable value is logged and the default is used.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::database::Database;
use crate::alarm::TimeOfDay;
use crate::challenge::{validate_set, Question};
use crate::error::{CoreError, DatabaseError, ValidationError};

pub mod keys {
    pub const ALARM_TIME: &str = "alarmTime";
    pub const ALARM_ACTIVE: &str = "alarmActive";
    pub const QUESTIONS: &str = "quizQuestions";
    pub const EMAIL_ENABLED: &str = "emailEnabled";
    pub const EMAIL_ADDRESS: &str = "emailAddress";
    pub const EMAIL_MESSAGE: &str = "emailCustomMessage";
    pub const EMAIL_SUBJECT: &str = "emailCustomSubject";
}

pub const DEFAULT_EMAIL_MESSAGE: &str =
    "Ich bin zu faul zum Aufstehen und muss jetzt die Konsequenzen tragen!";
pub const DEFAULT_EMAIL_SUBJECT: &str = "Momentum Maker - Wecker-Versagen!";

/// Get/set by string key. The only thing the engine needs from persistence.
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>, DatabaseError>;
    fn set(&self, key: &str, value: &str) -> Result<(), DatabaseError>;
    fn remove(&self, key: &str) -> Result<(), DatabaseError>;
}

impl KvStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        self.kv_get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.kv_set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), DatabaseError> {
        self.kv_delete(key)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmConfig {
    pub time_of_day: TimeOfDay,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailConfig {
    pub enabled: bool,
    pub recipient: String,
    pub custom_message: String,
    pub custom_subject: String,
}

impl EmailConfig {
    pub fn new(enabled: bool, recipient: impl Into<String>) -> Self {
        Self {
            enabled,
            recipient: recipient.into(),
            custom_message: DEFAULT_EMAIL_MESSAGE.into(),
            custom_subject: DEFAULT_EMAIL_SUBJECT.into(),
        }
    }

    /// Enabled with a usable recipient.
    pub fn is_deliverable(&self) -> bool {
        self.enabled && !self.recipient.trim().is_empty()
    }
}

pub struct Settings<S: KvStore> {
    store: S,
}

impl<S: KvStore> Settings<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "settings read failed; using default");
                None
            }
        }
    }

    // ── Alarm ────────────────────────────────────────────────────────

    pub fn alarm(&self) -> AlarmConfig {
        let time_of_day = match self.read(keys::ALARM_TIME) {
            Some(raw) => raw.parse().unwrap_or_else(|e: ValidationError| {
                warn!(value = %raw, error = %e, "stored alarm time unreadable; using default");
                TimeOfDay::default()
            }),
            None => TimeOfDay::default(),
        };
        let active = self.read(keys::ALARM_ACTIVE).as_deref() == Some("true");
        AlarmConfig {
            time_of_day,
            active,
        }
    }

    pub fn set_alarm_time(&self, time: TimeOfDay) -> Result<(), DatabaseError> {
        self.store.set(keys::ALARM_TIME, &time.to_string())
    }

    pub fn set_alarm_active(&self, active: bool) -> Result<(), DatabaseError> {
        self.store
            .set(keys::ALARM_ACTIVE, if active { "true" } else { "false" })
    }

    // ── Email ────────────────────────────────────────────────────────

    /// `None` unless both the enabled flag and the address have been saved.
    pub fn email(&self) -> Option<EmailConfig> {
        let enabled = self.read(keys::EMAIL_ENABLED)?;
        let recipient = self.read(keys::EMAIL_ADDRESS)?;
        Some(EmailConfig {
            enabled: enabled == "true",
            recipient,
            custom_message: self
                .read(keys::EMAIL_MESSAGE)
                .unwrap_or_else(|| DEFAULT_EMAIL_MESSAGE.into()),
            custom_subject: self
                .read(keys::EMAIL_SUBJECT)
                .unwrap_or_else(|| DEFAULT_EMAIL_SUBJECT.into()),
        })
    }

    pub fn set_email(&self, email: &EmailConfig) -> Result<(), DatabaseError> {
        self.store.set(
            keys::EMAIL_ENABLED,
            if email.enabled { "true" } else { "false" },
        )?;
        self.store.set(keys::EMAIL_ADDRESS, &email.recipient)?;
        self.store.set(keys::EMAIL_MESSAGE, &email.custom_message)?;
        self.store.set(keys::EMAIL_SUBJECT, &email.custom_subject)
    }

    // ── Questions ────────────────────────────────────────────────────

    /// Stored question set; empty when none is saved or it cannot be read.
    pub fn questions(&self) -> Vec<Question> {
        let Some(raw) = self.read(keys::QUESTIONS) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<Question>>(&raw) {
            Ok(questions) => questions,
            Err(e) => {
                warn!(error = %e, "stored questions unreadable; treating as empty");
                Vec::new()
            }
        }
    }

    /// Validate and store a full question set. Ids are renumbered from 1.
    pub fn set_questions(&self, questions: &[Question]) -> Result<(), CoreError> {
        validate_set(questions)?;
        let numbered: Vec<Question> = questions
            .iter()
            .enumerate()
            .map(|(i, q)| Question {
                id: i as u32 + 1,
                ..q.clone()
            })
            .collect();
        let json = serde_json::to_string(&numbered)?;
        self.store.set(keys::QUESTIONS, &json)?;
        Ok(())
    }

    pub fn clear_questions(&self) -> Result<(), DatabaseError> {
        self.store.remove(keys::QUESTIONS)
    }
}
