//! Daily alarm scheduler.
//!
//! Owns at most one armed trigger. Arming spawns a tokio task that sleeps
//! until the trigger instant, sends a [`TriggerFired`] message, then re-arms
//! itself exactly 24 hours later. This is the only repeat mechanism; the
//! fired message does not depend on anyone answering the challenge.
//!
//! ## Usage
//!
//! ```ignore
//! let (tx, mut rx) = tokio::sync::mpsc::channel(4);
//! let mut scheduler = AlarmScheduler::new(Arc::new(StaticPermission::granted()), tx);
//! if scheduler.arm(TimeOfDay::new(7, 0)?) {
//!     while let Some(fired) = rx.recv().await { /* dispatch */ }
//! }
//! ```

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::time_of_day::{next_trigger, TimeOfDay};

const DAY: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Platform permission to raise scheduled alerts.
pub trait AlertPermission: Send + Sync {
    /// Ask for permission; may prompt the user.
    fn request(&self) -> PermissionStatus;

    /// Give back whatever the grant holds on to.
    fn release(&self) {}
}

/// Permission with a fixed answer. Terminal front ends have nothing to ask.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermission(pub PermissionStatus);

impl StaticPermission {
    pub fn granted() -> Self {
        Self(PermissionStatus::Granted)
    }

    pub fn denied() -> Self {
        Self(PermissionStatus::Denied)
    }
}

impl AlertPermission for StaticPermission {
    fn request(&self) -> PermissionStatus {
        self.0
    }
}

/// The next instant the alarm will fire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTrigger {
    pub fires_at: DateTime<Utc>,
    pub repeats: bool,
}

/// Message sent on the fire channel each time the trigger elapses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerFired {
    pub fires_at: DateTime<Utc>,
}

struct Armed {
    time: TimeOfDay,
    trigger: Arc<Mutex<ScheduledTrigger>>,
    task: JoinHandle<()>,
}

pub struct AlarmScheduler {
    permission: Arc<dyn AlertPermission>,
    fired_tx: mpsc::Sender<TriggerFired>,
    armed: Option<Armed>,
    holds_permission: bool,
}

impl AlarmScheduler {
    pub fn new(permission: Arc<dyn AlertPermission>, fired_tx: mpsc::Sender<TriggerFired>) -> Self {
        Self {
            permission,
            fired_tx,
            armed: None,
            holds_permission: false,
        }
    }

    /// Arm the alarm for `time` in the local timezone.
    ///
    /// Must be called from within a tokio runtime. Returns `false` and leaves
    /// nothing armed when permission is denied.
    pub fn arm(&mut self, time: TimeOfDay) -> bool {
        self.arm_from(time, Local::now())
    }

    /// Arm relative to an explicit `now`; the wall-clock variant of [`arm`](Self::arm).
    pub fn arm_from<Tz: TimeZone>(&mut self, time: TimeOfDay, now: DateTime<Tz>) -> bool {
        self.cancel_task();

        match self.permission.request() {
            PermissionStatus::Granted => self.holds_permission = true,
            PermissionStatus::Denied => {
                warn!(%time, "alert permission denied; alarm not armed");
                self.release_permission();
                return false;
            }
        }

        let fires_at = next_trigger(&now, time).with_timezone(&Utc);
        let delay = (fires_at - now.with_timezone(&Utc))
            .to_std()
            .unwrap_or_default();
        let trigger = Arc::new(Mutex::new(ScheduledTrigger {
            fires_at,
            repeats: true,
        }));

        let task = tokio::spawn(run_trigger(
            Instant::now() + delay,
            Arc::clone(&trigger),
            self.fired_tx.clone(),
        ));

        info!(%time, %fires_at, "alarm armed");
        self.armed = Some(Armed {
            time,
            trigger,
            task,
        });
        true
    }

    /// Cancel the pending trigger and release the permission grant.
    /// Calling it again is a no-op.
    pub fn disarm(&mut self) {
        if self.cancel_task() {
            info!("alarm disarmed");
        }
        self.release_permission();
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Time of day the alarm is armed for.
    pub fn armed_time(&self) -> Option<TimeOfDay> {
        self.armed.as_ref().map(|a| a.time)
    }

    /// Trigger that will fire next, if armed.
    pub fn next_trigger(&self) -> Option<ScheduledTrigger> {
        let armed = self.armed.as_ref()?;
        let trigger = armed
            .trigger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Some(trigger.clone())
    }

    fn cancel_task(&mut self) -> bool {
        match self.armed.take() {
            Some(armed) => {
                armed.task.abort();
                true
            }
            None => false,
        }
    }

    fn release_permission(&mut self) {
        if self.holds_permission {
            self.permission.release();
            self.holds_permission = false;
        }
    }
}

impl Drop for AlarmScheduler {
    fn drop(&mut self) {
        self.cancel_task();
    }
}

async fn run_trigger(
    first: Instant,
    trigger: Arc<Mutex<ScheduledTrigger>>,
    fired_tx: mpsc::Sender<TriggerFired>,
) {
    let mut deadline = first;
    loop {
        tokio::time::sleep_until(deadline).await;

        let fires_at = {
            let mut current = trigger.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let fired = current.fires_at;
            current.fires_at = fired + Duration::hours(24);
            fired
        };

        debug!(%fires_at, "alarm trigger elapsed");
        if fired_tx.send(TriggerFired { fires_at }).await.is_err() {
            debug!("fire channel closed; stopping alarm trigger");
            return;
        }
        deadline += DAY;
    }
}
