use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use super::session::{Session, SessionHandle, SessionReport};
use crate::alarm::TriggerFired;
use crate::challenge::{Challenge, ChallengeSnapshot, Question};
use crate::error::CoreError;
use crate::events::Event;
use crate::notify::{EmailSender, OutcomeNotifier};
use crate::sound::AlarmSound;
use crate::storage::{Config, EmailConfig};

/// Timing the dispatcher hands to each session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchTiming {
    pub deadline: Duration,
    pub feedback_delay: Duration,
    pub notify_timeout: Duration,
}

impl Default for DispatchTiming {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for DispatchTiming {
    fn from(config: &Config) -> Self {
        Self {
            deadline: config.challenge.deadline(),
            feedback_delay: config.challenge.feedback_delay(),
            notify_timeout: config.relay.timeout(),
        }
    }
}

/// Turns a trigger fire into a running challenge.
///
/// For each fire, in order: start the alarm sound, enter the challenge,
/// then start the safety-net timer at the same instant as the countdown.
pub struct TriggerDispatcher {
    sound: Arc<AlarmSound>,
    sender: Arc<dyn EmailSender>,
    events: broadcast::Sender<Event>,
    reports: mpsc::UnboundedSender<SessionReport>,
    timing: DispatchTiming,
    active: Option<SessionHandle>,
}

impl TriggerDispatcher {
    pub fn new(
        sound: Arc<AlarmSound>,
        sender: Arc<dyn EmailSender>,
        events: broadcast::Sender<Event>,
        reports: mpsc::UnboundedSender<SessionReport>,
        timing: DispatchTiming,
    ) -> Self {
        Self {
            sound,
            sender,
            events,
            reports,
            timing,
            active: None,
        }
    }

    fn emit(&self, event: Event) {
        let _ = self.events.send(event);
    }

    /// Handle one trigger fire.
    ///
    /// `questions` and `email` are read by the caller at fire time, so a
    /// settings change mid-challenge does not affect the running one.
    ///
    /// # Errors
    /// `ChallengeInProgress` if the previous challenge is still running;
    /// `ChallengeDataMissing` when `questions` is empty.
    pub fn dispatch(
        &mut self,
        fired: TriggerFired,
        questions: Vec<Question>,
        email: Option<EmailConfig>,
    ) -> Result<Uuid, CoreError> {
        if self.is_active() {
            warn!(fires_at = %fired.fires_at, "trigger fired during a running challenge; ignored");
            return Err(CoreError::ChallengeInProgress);
        }

        info!(fires_at = %fired.fires_at, "alarm fired");
        self.emit(Event::AlarmFired {
            fires_at: fired.fires_at,
            at: Utc::now(),
        });
        self.sound.play_alarm();

        let challenge = match Challenge::start(questions, self.timing.deadline) {
            Ok(challenge) => challenge,
            Err(e) => {
                warn!(error = %e, "challenge not started; back to idle");
                self.sound.stop();
                self.emit(Event::ChallengeAborted {
                    reason: e.to_string(),
                    at: Utc::now(),
                });
                return Err(e);
            }
        };

        let challenge_id = challenge.id();
        self.emit(Event::ChallengeStarted {
            challenge_id,
            questions: challenge.len(),
            deadline: challenge.deadline(),
            at: Utc::now(),
        });
        if let Some(event) = challenge.present() {
            self.emit(event);
        }

        let session = Session {
            challenge,
            notifier: OutcomeNotifier::new(
                Arc::clone(&self.sender),
                email,
                self.timing.notify_timeout,
            ),
            sound: Arc::clone(&self.sound),
            events: self.events.clone(),
            reports: self.reports.clone(),
            feedback_delay: self.timing.feedback_delay,
        };
        self.active = Some(session.spawn(Instant::now(), self.timing.deadline));
        Ok(challenge_id)
    }

    /// Forward an answer to the running challenge.
    pub fn answer(&self, option: usize) -> bool {
        match &self.active {
            Some(session) if !session.is_finished() => session.answer(option),
            _ => false,
        }
    }

    /// Cancel the running challenge, if any, without notifying.
    pub fn abort_active(&mut self) -> bool {
        match self.active.take() {
            Some(session) if !session.is_finished() => {
                info!(challenge_id = %session.challenge_id(), "aborting running challenge");
                session.abort();
                true
            }
            _ => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.as_ref().is_some_and(|s| !s.is_finished())
    }

    pub fn active_challenge(&self) -> Option<Uuid> {
        self.active
            .as_ref()
            .filter(|s| !s.is_finished())
            .map(SessionHandle::challenge_id)
    }

    pub async fn snapshot(&self) -> Option<ChallengeSnapshot> {
        match &self.active {
            Some(session) => session.snapshot().await,
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AudioError, NotifyError};
    use crate::notify::NotifyOutcome;
    use crate::sound::AudioPlayer;
    use crate::storage::ChallengeOutcome;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct Recorder {
        plays: AtomicU32,
        stops: AtomicU32,
        sends: AtomicU32,
    }

    impl AudioPlayer for Recorder {
        fn play(&self) -> Result<(), AudioError> {
            self.plays.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl EmailSender for Recorder {
        async fn send(&self, _: &str, _: &str, _: &str) -> Result<Option<String>, NotifyError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    struct Harness {
        dispatcher: TriggerDispatcher,
        recorder: Arc<Recorder>,
        events: broadcast::Receiver<Event>,
        reports: mpsc::UnboundedReceiver<SessionReport>,
    }

    fn harness() -> Harness {
        let recorder = Arc::new(Recorder::default());
        let sound = Arc::new(AlarmSound::new(
            recorder.clone(),
            3,
            Duration::from_secs(3),
        ));
        let (events_tx, events) = broadcast::channel(256);
        let (reports_tx, reports) = mpsc::unbounded_channel();
        let timing = DispatchTiming {
            feedback_delay: Duration::ZERO,
            ..DispatchTiming::default()
        };
        Harness {
            dispatcher: TriggerDispatcher::new(sound, recorder.clone(), events_tx, reports_tx, timing),
            recorder,
            events,
            reports,
        }
    }

    fn quiz() -> Vec<Question> {
        vec![Question::new(
            1,
            "1 + 1?",
            vec!["1".into(), "2".into(), "3".into(), "4".into()],
            1,
        )]
    }

    fn fired() -> TriggerFired {
        TriggerFired { fires_at: Utc::now() }
    }

    fn email() -> Option<EmailConfig> {
        Some(EmailConfig::new(true, "friend@example.com"))
    }

    #[tokio::test(start_paused = true)]
    async fn missing_questions_abort_and_stop_sound() {
        let mut h = harness();
        let result = h.dispatcher.dispatch(fired(), Vec::new(), email());

        assert!(matches!(result, Err(CoreError::ChallengeDataMissing)));
        assert!(!h.dispatcher.is_active());
        assert!(matches!(h.events.recv().await, Ok(Event::AlarmFired { .. })));
        assert!(matches!(h.events.recv().await, Ok(Event::ChallengeAborted { .. })));
        assert_eq!(h.recorder.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fire_during_challenge_is_ignored() {
        let mut h = harness();
        let first = h.dispatcher.dispatch(fired(), quiz(), email()).unwrap();
        assert!(matches!(
            h.dispatcher.dispatch(fired(), quiz(), email()),
            Err(CoreError::ChallengeInProgress)
        ));
        assert_eq!(h.dispatcher.active_challenge(), Some(first));
    }

    #[tokio::test(start_paused = true)]
    async fn success_stops_sound_without_email() {
        let mut h = harness();
        h.dispatcher.dispatch(fired(), quiz(), email()).unwrap();
        assert!(h.dispatcher.answer(1));

        let report = h.reports.recv().await.unwrap();
        assert_eq!(report.outcome, ChallengeOutcome::Success);
        assert_eq!(report.notification, None);
        assert_eq!(h.recorder.sends.load(Ordering::SeqCst), 0);
        assert!(h.recorder.stops.load(Ordering::SeqCst) >= 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(h.recorder.sends.load(Ordering::SeqCst), 0);
        assert!(!h.dispatcher.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_sends_one_email() {
        let mut h = harness();
        h.dispatcher.dispatch(fired(), quiz(), email()).unwrap();

        let report = h.reports.recv().await.unwrap();
        assert_eq!(report.outcome, ChallengeOutcome::Failure);
        assert_eq!(report.notification, Some(NotifyOutcome::Sent { message_id: None }));
        assert_eq!(h.recorder.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn abort_cancels_without_email() {
        let mut h = harness();
        h.dispatcher.dispatch(fired(), quiz(), email()).unwrap();
        assert!(h.dispatcher.abort_active());
        assert!(!h.dispatcher.abort_active());

        let report = h.reports.recv().await.unwrap();
        assert_eq!(report.outcome, ChallengeOutcome::Aborted);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(h.recorder.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_reports_countdown() {
        let mut h = harness();
        h.dispatcher.dispatch(fired(), quiz(), email()).unwrap();
        tokio::time::sleep(Duration::from_millis(10_500)).await;

        let snap = h.dispatcher.snapshot().await.unwrap();
        assert_eq!(snap.remaining_secs, 50);
        assert_eq!(snap.prompt, "1 + 1?");
    }
}
