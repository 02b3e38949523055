//! # Momentum Core Library
//!
//! Deadline enforcement engine for the Momentum Maker wake-up alarm. The
//! alarm fires at a daily time of day, a sound loop starts and the user has
//! a fixed time budget to answer every quiz question correctly in one
//! unbroken run. If the budget runs out, one failure email goes out through
//! the relay.
//!
//! ## Architecture
//!
//! - **Alarm Scheduler**: computes the next trigger and re-arms itself daily
//! - **Trigger Dispatcher**: starts the sound, the challenge and the
//!   safety-net deadline on each fire
//! - **Challenge**: tick-driven state machine that resolves exactly once
//! - **Outcome Notifier**: at-most-once failure email behind an atomic lock
//! - **Storage**: SQLite settings/history and TOML configuration
//!
//! ## Key Components
//!
//! - [`AlarmScheduler`]: Daily trigger
//! - [`Challenge`]: Quiz state machine
//! - [`OutcomeNotifier`]: Failure email delivery
//! - [`App`]: Event loop hosting all of the above

pub mod alarm;
pub mod app;
pub mod challenge;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod notify;
pub mod sound;
pub mod storage;

pub use alarm::{AlarmScheduler, AlertPermission, PermissionStatus, StaticPermission, TimeOfDay, TriggerFired};
pub use app::{App, AppCommand, AppServices};
pub use challenge::{Challenge, ChallengeSnapshot, Question, Resolution};
pub use dispatch::{DispatchTiming, SessionReport, TriggerDispatcher};
pub use error::{AudioError, ConfigError, CoreError, DatabaseError, NotifyError, ValidationError};
pub use events::Event;
pub use notify::{EmailSender, NotifyOutcome, OutcomeNotifier, RelayClient};
pub use sound::{AlarmSound, AudioPlayer, SilentPlayer};
pub use storage::{Config, Database, EmailConfig, Settings};
