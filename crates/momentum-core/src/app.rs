//! Application event loop.
//!
//! Wires the scheduler, the dispatcher and the settings store together and
//! serves front-end commands. Runs on the caller's task; the database is
//! only touched from here.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::alarm::{AlarmScheduler, AlertPermission, TimeOfDay, TriggerFired};
use crate::challenge::ChallengeSnapshot;
use crate::dispatch::{DispatchTiming, SessionReport, TriggerDispatcher};
use crate::error::CoreError;
use crate::events::Event;
use crate::notify::EmailSender;
use crate::sound::{AlarmSound, AudioPlayer};
use crate::storage::{Config, Database, DisarmPolicy, Settings};

const EVENT_BUFFER: usize = 256;

/// Commands a front end can send to a running [`App`].
#[derive(Debug)]
pub enum AppCommand {
    SetTime(TimeOfDay),
    SetActive(bool),
    /// Answer the current question (0-based option index).
    Answer(usize),
    /// Fire the trigger now, as if the alarm went off.
    FireNow,
    Snapshot(oneshot::Sender<Option<ChallengeSnapshot>>),
    Shutdown,
}

/// Platform collaborators.
pub struct AppServices {
    pub permission: Arc<dyn AlertPermission>,
    pub player: Arc<dyn AudioPlayer>,
    pub sender: Arc<dyn EmailSender>,
}

pub struct App {
    settings: Settings<Database>,
    config: Config,
    scheduler: AlarmScheduler,
    fired_rx: mpsc::Receiver<TriggerFired>,
    dispatcher: TriggerDispatcher,
    reports_rx: mpsc::UnboundedReceiver<SessionReport>,
    events: broadcast::Sender<Event>,
}

impl App {
    /// Must be called from within a tokio runtime.
    pub fn new(db: Database, config: Config, services: AppServices) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (fired_tx, fired_rx) = mpsc::channel(4);
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();

        let sound = Arc::new(AlarmSound::from_config(services.player, &config.sound));
        let dispatcher = TriggerDispatcher::new(
            sound,
            services.sender,
            events.clone(),
            reports_tx,
            DispatchTiming::from(&config),
        );

        Self {
            settings: Settings::new(db),
            config,
            scheduler: AlarmScheduler::new(services.permission, fired_tx),
            fired_rx,
            dispatcher,
            reports_rx,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> &Settings<Database> {
        &self.settings
    }

    pub fn scheduler(&self) -> &AlarmScheduler {
        &self.scheduler
    }

    pub fn dispatcher(&self) -> &TriggerDispatcher {
        &self.dispatcher
    }

    fn emit(&self, event: Event) {
        let _ = self.events.send(event);
    }

    /// Re-arm a previously active alarm after start-up.
    pub fn restore(&mut self) {
        let alarm = self.settings.alarm();
        if !alarm.active {
            return;
        }
        if let Err(e) = self.arm(alarm.time_of_day) {
            warn!(error = %e, "could not restore alarm");
        }
    }

    /// Store a new alarm time; re-arms when the alarm is on.
    pub fn set_time(&mut self, time: TimeOfDay) -> Result<(), CoreError> {
        self.settings.set_alarm_time(time)?;
        if self.settings.alarm().active {
            self.arm(time)?;
        }
        Ok(())
    }

    /// Switch the alarm on or off.
    ///
    /// # Errors
    /// `PermissionDenied` when arming is refused; `alarmActive` is then
    /// stored as false.
    pub fn set_active(&mut self, active: bool) -> Result<(), CoreError> {
        if active {
            let time = self.settings.alarm().time_of_day;
            self.arm(time)
        } else {
            self.disarm()
        }
    }

    fn arm(&mut self, time: TimeOfDay) -> Result<(), CoreError> {
        if !self.scheduler.arm(time) {
            self.settings.set_alarm_active(false)?;
            self.emit(Event::AlarmPermissionDenied { at: Utc::now() });
            return Err(CoreError::PermissionDenied);
        }
        self.settings.set_alarm_active(true)?;
        if let Some(trigger) = self.scheduler.next_trigger() {
            self.emit(Event::AlarmArmed {
                fires_at: trigger.fires_at,
                at: Utc::now(),
            });
        }
        Ok(())
    }

    fn disarm(&mut self) -> Result<(), CoreError> {
        self.scheduler.disarm();
        self.settings.set_alarm_active(false)?;
        self.emit(Event::AlarmDisarmed { at: Utc::now() });
        if self.config.alarm.disarm_policy == DisarmPolicy::AbortActive {
            self.dispatcher.abort_active();
        }
        Ok(())
    }

    fn on_fired(&mut self, fired: TriggerFired) {
        let questions = self.settings.questions();
        let email = self.settings.email();
        match self.dispatcher.dispatch(fired, questions, email) {
            Ok(id) => debug!(challenge_id = %id, "challenge running"),
            Err(e) => info!(error = %e, "trigger not turned into a challenge"),
        }
    }

    fn on_report(&self, report: &SessionReport) {
        if let Err(e) = self.settings.store().record_challenge(&report.to_record()) {
            warn!(error = %e, "could not record challenge history");
        }
    }

    async fn handle(&mut self, cmd: AppCommand) {
        let result = match cmd {
            AppCommand::SetTime(time) => self.set_time(time),
            AppCommand::SetActive(active) => self.set_active(active),
            AppCommand::Answer(option) => {
                if !self.dispatcher.answer(option) {
                    debug!(option, "no running challenge to answer");
                }
                Ok(())
            }
            AppCommand::FireNow => {
                self.on_fired(TriggerFired {
                    fires_at: Utc::now(),
                });
                Ok(())
            }
            AppCommand::Snapshot(reply) => {
                let _ = reply.send(self.dispatcher.snapshot().await);
                Ok(())
            }
            AppCommand::Shutdown => Ok(()),
        };
        if let Err(e) = result {
            warn!(error = %e, "command failed");
        }
    }

    /// Serve until `Shutdown` or until every command sender is gone.
    ///
    /// A challenge still running at shutdown follows the disarm policy:
    /// `finish_active` waits for it to resolve (and notify), `abort_active`
    /// cancels it. Either way it is recorded.
    pub async fn run(mut self, mut commands: mpsc::Receiver<AppCommand>) {
        self.restore();
        loop {
            tokio::select! {
                Some(fired) = self.fired_rx.recv() => self.on_fired(fired),
                Some(report) = self.reports_rx.recv() => self.on_report(&report),
                cmd = commands.recv() => match cmd {
                    Some(AppCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle(cmd).await,
                },
            }
        }

        let running = match self.config.alarm.disarm_policy {
            DisarmPolicy::FinishActive => {
                let running = self.dispatcher.is_active();
                if running {
                    info!("waiting for the running challenge to resolve");
                }
                running
            }
            DisarmPolicy::AbortActive => self.dispatcher.abort_active(),
        };
        if running {
            if let Some(report) = self.reports_rx.recv().await {
                self.on_report(&report);
            }
        }
        while let Ok(report) = self.reports_rx.try_recv() {
            self.on_report(&report);
        }
        info!("momentum engine stopped");
    }
}
