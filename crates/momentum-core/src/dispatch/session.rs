//! Challenge session actor.
//!
//! One task per challenge owns the [`Challenge`] and is the only code that
//! mutates it. It multiplexes its own one-second countdown, the feedback
//! pause, front-end answers and the dispatcher's safety-net signal. Whichever
//! resolves the challenge first wins; everything after that sees a terminal
//! state and does nothing.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::challenge::{Challenge, ChallengeSnapshot, Resolution, TICK};
use crate::events::Event;
use crate::notify::{NotifyOutcome, OutcomeNotifier};
use crate::sound::AlarmSound;
use crate::storage::{ChallengeOutcome, ChallengeRecord};

#[derive(Debug)]
pub enum SessionCommand {
    Answer(usize),
    /// The safety-net deadline elapsed.
    DeadlineElapsed,
    Snapshot(oneshot::Sender<ChallengeSnapshot>),
    /// Cancel without resolving; a pending notification is dropped.
    Abort,
}

/// Summary of a finished session, sent back to whoever keeps history.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub challenge_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub resolved_at: DateTime<Utc>,
    pub outcome: ChallengeOutcome,
    pub questions: u32,
    pub correct_answers: u32,
    pub restarts: u32,
    /// `None` when no notification was due or it was cancelled.
    pub notification: Option<NotifyOutcome>,
}

impl SessionReport {
    pub fn to_record(&self) -> ChallengeRecord {
        ChallengeRecord {
            id: 0,
            challenge_id: self.challenge_id.to_string(),
            started_at: self.started_at,
            resolved_at: self.resolved_at,
            outcome: self.outcome,
            questions: self.questions,
            correct_answers: self.correct_answers,
            restarts: self.restarts,
            notification: self.notification.as_ref().map(|n| {
                match n {
                    NotifyOutcome::Sent { .. } => "sent",
                    NotifyOutcome::Failed { .. } => "failed",
                    NotifyOutcome::Skipped { .. } => "skipped",
                    NotifyOutcome::AlreadyHandled => "already_handled",
                }
                .to_string()
            }),
        }
    }
}

/// Front-end side of a running session.
#[derive(Debug)]
pub struct SessionHandle {
    challenge_id: Uuid,
    commands: mpsc::UnboundedSender<SessionCommand>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn challenge_id(&self) -> Uuid {
        self.challenge_id
    }

    /// Forward an answer. Returns `false` once the session has ended.
    pub fn answer(&self, option: usize) -> bool {
        self.commands.send(SessionCommand::Answer(option)).is_ok()
    }

    pub fn abort(&self) {
        let _ = self.commands.send(SessionCommand::Abort);
    }

    /// Current view of the challenge, `None` once the session has ended.
    pub async fn snapshot(&self) -> Option<ChallengeSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(SessionCommand::Snapshot(tx)).ok()?;
        rx.await.ok()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

pub(crate) struct Session {
    pub(crate) challenge: Challenge,
    pub(crate) notifier: OutcomeNotifier,
    pub(crate) sound: Arc<AlarmSound>,
    pub(crate) events: broadcast::Sender<Event>,
    pub(crate) reports: mpsc::UnboundedSender<SessionReport>,
    pub(crate) feedback_delay: Duration,
}

enum Exit {
    Resolved,
    Aborted,
}

impl Session {
    /// Spawn the actor and its safety net. `started` is the instant both the
    /// countdown and the safety net measure from.
    pub fn spawn(self, started: Instant, deadline: Duration) -> SessionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let challenge_id = self.challenge.id();

        let safety_tx = tx.clone();
        let safety_net = tokio::spawn(async move {
            tokio::time::sleep_until(started + deadline).await;
            debug!("safety-net deadline elapsed");
            let _ = safety_tx.send(SessionCommand::DeadlineElapsed);
        });

        let task = tokio::spawn(self.run(started, rx, safety_net));
        SessionHandle {
            challenge_id,
            commands: tx,
            task,
        }
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn present(&self) {
        if let Some(event) = self.challenge.present() {
            self.emit(event);
        }
    }

    async fn run(
        mut self,
        started: Instant,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        safety_net: JoinHandle<()>,
    ) {
        let mut ticker = interval_at(started + TICK, TICK);
        let feedback = sleep(Duration::ZERO);
        tokio::pin!(feedback);
        let mut feedback_armed = false;

        let exit = loop {
            tokio::select! {
                biased;

                _ = ticker.tick() => {
                    match self.challenge.tick() {
                        Some(event) => {
                            self.emit(event);
                            break Exit::Resolved;
                        }
                        None => self.emit(Event::ChallengeTick {
                            remaining_secs: self.challenge.remaining_secs(),
                            at: Utc::now(),
                        }),
                    }
                }

                () = &mut feedback, if feedback_armed => {
                    feedback_armed = false;
                    self.challenge.acknowledge();
                    self.present();
                }

                cmd = commands.recv() => match cmd {
                    Some(SessionCommand::Answer(option)) => {
                        let Some(event) = self.challenge.answer(option) else {
                            debug!(option, "answer ignored");
                            continue;
                        };
                        let resolved = event.is_resolution();
                        self.emit(event);
                        if resolved {
                            break Exit::Resolved;
                        }
                        if self.feedback_delay.is_zero() {
                            self.challenge.acknowledge();
                            self.present();
                        } else {
                            feedback.as_mut().reset(Instant::now() + self.feedback_delay);
                            feedback_armed = true;
                        }
                    }
                    Some(SessionCommand::DeadlineElapsed) => {
                        if let Some(event) = self.challenge.force_failure() {
                            warn!("safety net resolved the challenge");
                            self.emit(event);
                            break Exit::Resolved;
                        }
                    }
                    Some(SessionCommand::Snapshot(reply)) => {
                        let _ = reply.send(self.challenge.snapshot());
                    }
                    Some(SessionCommand::Abort) | None => break Exit::Aborted,
                },
            }
        };

        safety_net.abort();
        self.sound.stop();

        let outcome = match (exit, self.challenge.resolution()) {
            (Exit::Resolved, Resolution::Success) => ChallengeOutcome::Success,
            (Exit::Resolved, Resolution::Failure) => ChallengeOutcome::Failure,
            _ => ChallengeOutcome::Aborted,
        };
        info!(
            challenge_id = %self.challenge.id(),
            outcome = outcome.as_str(),
            correct_answers = self.challenge.correct_answers(),
            restarts = self.challenge.restarts(),
            "challenge finished"
        );

        let notification = if outcome == ChallengeOutcome::Failure {
            self.send_failure_notice(&mut commands).await
        } else {
            None
        };

        let report = SessionReport {
            challenge_id: self.challenge.id(),
            started_at: self.challenge.started_at(),
            resolved_at: Utc::now(),
            outcome,
            questions: self.challenge.len() as u32,
            correct_answers: self.challenge.correct_answers(),
            restarts: self.challenge.restarts(),
            notification,
        };
        if self.reports.send(report).is_err() {
            debug!("no report listener");
        }
    }

    /// Run the notifier; an `Abort` arriving meanwhile drops the send.
    async fn send_failure_notice(
        &self,
        commands: &mut mpsc::UnboundedReceiver<SessionCommand>,
    ) -> Option<NotifyOutcome> {
        let notify = self.notifier.notify_failure();
        tokio::pin!(notify);

        let outcome = loop {
            tokio::select! {
                outcome = &mut notify => break Some(outcome),
                cmd = commands.recv() => match cmd {
                    Some(SessionCommand::Abort) => {
                        info!("failure notification cancelled");
                        break None;
                    }
                    // Nobody is left to cancel; finish the send.
                    None => break Some((&mut notify).await),
                    Some(SessionCommand::Snapshot(reply)) => {
                        let _ = reply.send(self.challenge.snapshot());
                    }
                    Some(_) => {}
                },
            }
        };

        if let Some(outcome) = &outcome {
            self.emit(Event::NotificationFinished {
                outcome: outcome.clone(),
                at: Utc::now(),
            });
        }
        outcome
    }
}
