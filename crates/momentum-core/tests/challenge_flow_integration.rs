//! End-to-end challenge flows through the application event loop.
//!
//! Time is paused, so the 60 second budget elapses instantly while keeping
//! the ordering between the countdown, the safety net and answers.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use momentum_core::storage::{ChallengeOutcome, DisarmPolicy};
use momentum_core::{
    App, AppCommand, AppServices, Config, Database, EmailConfig, EmailSender, Event, NotifyError,
    Question, Settings, SilentPlayer, StaticPermission, TimeOfDay,
};
use tokio::sync::{broadcast, mpsc};

#[derive(Default)]
struct CountingSender {
    sends: AtomicU32,
}

#[async_trait]
impl EmailSender for CountingSender {
    async fn send(&self, recipient: &str, _: &str, _: &str) -> Result<Option<String>, NotifyError> {
        assert_eq!(recipient, "friend@example.com");
        self.sends.fetch_add(1, Ordering::SeqCst);
        Ok(Some("msg-1".into()))
    }
}

fn quiz(n: usize) -> Vec<Question> {
    (0..n)
        .map(|i| {
            Question::new(
                0,
                format!("Question {}", i + 1),
                vec!["a".into(), "b".into(), "c".into(), "d".into()],
                i % 4,
            )
        })
        .collect()
}

fn build_app(
    path: &Path,
    config: Config,
    permission: StaticPermission,
    questions: usize,
) -> (App, Arc<CountingSender>) {
    let sender = Arc::new(CountingSender::default());
    let services = AppServices {
        permission: Arc::new(permission),
        player: Arc::new(SilentPlayer),
        sender: sender.clone(),
    };
    let app = App::new(Database::open_at(path).unwrap(), config, services);
    if questions > 0 {
        app.settings().set_questions(&quiz(questions)).unwrap();
    }
    app.settings()
        .set_email(&EmailConfig::new(true, "friend@example.com"))
        .unwrap();
    (app, sender)
}

fn instant_feedback() -> Config {
    let mut config = Config::default();
    config.challenge.feedback_delay_ms = 0;
    config
}

async fn wait_for(events: &mut broadcast::Receiver<Event>, pred: impl Fn(&Event) -> bool) -> Event {
    loop {
        let event = events.recv().await.expect("event stream closed");
        if pred(&event) {
            return event;
        }
    }
}

fn history(path: &Path) -> Vec<momentum_core::storage::ChallengeRecord> {
    Database::open_at(path).unwrap().recent_challenges(10).unwrap()
}

#[tokio::test(start_paused = true)]
async fn no_answers_fails_at_deadline_and_notifies_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("momentum.db");
    let (app, sender) = build_app(&path, Config::default(), StaticPermission::granted(), 3);
    let mut events = app.subscribe();
    let (tx, rx) = mpsc::channel(16);

    let script = async {
        tx.send(AppCommand::FireNow).await.unwrap();
        let started = tokio::time::Instant::now();
        wait_for(&mut events, |e| matches!(e, Event::ChallengeFailed { .. })).await;
        assert_eq!(started.elapsed(), Duration::from_secs(60));

        let finished = wait_for(&mut events, |e| {
            matches!(e, Event::NotificationFinished { .. })
        })
        .await;
        assert!(matches!(
            finished,
            Event::NotificationFinished {
                outcome: momentum_core::NotifyOutcome::Sent { .. },
                ..
            }
        ));

        // Nothing else fires after the safety net's instant has passed.
        tokio::time::sleep(Duration::from_secs(30)).await;
        tx.send(AppCommand::Shutdown).await.unwrap();
    };
    tokio::join!(app.run(rx), script);

    assert_eq!(sender.sends.load(Ordering::SeqCst), 1);
    let records = history(&path);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, ChallengeOutcome::Failure);
    assert_eq!(records[0].notification.as_deref(), Some("sent"));
}

#[tokio::test(start_paused = true)]
async fn success_at_59_seconds_disarms_safety_net() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("momentum.db");
    let (app, sender) = build_app(&path, instant_feedback(), StaticPermission::granted(), 1);
    let mut events = app.subscribe();
    let (tx, rx) = mpsc::channel(16);

    let script = async {
        tx.send(AppCommand::FireNow).await.unwrap();
        wait_for(&mut events, |e| matches!(e, Event::ChallengeStarted { .. })).await;

        tokio::time::sleep(Duration::from_secs(59)).await;
        tx.send(AppCommand::Answer(0)).await.unwrap();
        wait_for(&mut events, |e| matches!(e, Event::ChallengeSucceeded { .. })).await;

        tokio::time::sleep(Duration::from_secs(5)).await;
        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, Event::ChallengeFailed { .. }));
        }
        tx.send(AppCommand::Shutdown).await.unwrap();
    };
    tokio::join!(app.run(rx), script);

    assert_eq!(sender.sends.load(Ordering::SeqCst), 0);
    let records = history(&path);
    assert_eq!(records[0].outcome, ChallengeOutcome::Success);
    assert_eq!(records[0].notification, None);
}

#[tokio::test(start_paused = true)]
async fn wrong_answer_mid_run_restarts_and_counts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("momentum.db");
    let (app, sender) = build_app(&path, Config::default(), StaticPermission::granted(), 3);
    let mut events = app.subscribe();
    let (tx, rx) = mpsc::channel(16);

    // Correct answers are 0, 1, 2 for questions 1..=3.
    let script = async {
        tx.send(AppCommand::FireNow).await.unwrap();
        let answers = [(0, 0), (1, 3), (0, 0), (1, 1), (2, 2)];
        for (expected_index, option) in answers {
            let presented = wait_for(&mut events, |e| {
                matches!(e, Event::QuestionPresented { .. })
            })
            .await;
            assert!(matches!(
                presented,
                Event::QuestionPresented { index, .. } if index == expected_index
            ));
            tx.send(AppCommand::Answer(option)).await.unwrap();
            wait_for(&mut events, |e| {
                matches!(e, Event::AnswerJudged { .. } | Event::ChallengeSucceeded { .. })
            })
            .await;
        }
        tx.send(AppCommand::Shutdown).await.unwrap();
    };
    tokio::join!(app.run(rx), script);

    assert_eq!(sender.sends.load(Ordering::SeqCst), 0);
    let records = history(&path);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, ChallengeOutcome::Success);
    assert_eq!(records[0].correct_answers, 4);
    assert_eq!(records[0].restarts, 1);
}

#[tokio::test(start_paused = true)]
async fn fire_without_questions_returns_to_idle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("momentum.db");
    let (app, sender) = build_app(&path, Config::default(), StaticPermission::granted(), 0);
    let mut events = app.subscribe();
    let (tx, rx) = mpsc::channel(16);

    let script = async {
        tx.send(AppCommand::FireNow).await.unwrap();
        wait_for(&mut events, |e| matches!(e, Event::ChallengeAborted { .. })).await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        tx.send(AppCommand::Shutdown).await.unwrap();
    };
    tokio::join!(app.run(rx), script);

    assert_eq!(sender.sends.load(Ordering::SeqCst), 0);
    assert!(history(&path).is_empty());
}

#[tokio::test(start_paused = true)]
async fn denied_permission_turns_alarm_off() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("momentum.db");
    let (app, _) = build_app(&path, Config::default(), StaticPermission::denied(), 1);
    let mut events = app.subscribe();
    let (tx, rx) = mpsc::channel(16);

    let script = async {
        tx.send(AppCommand::SetActive(true)).await.unwrap();
        wait_for(&mut events, |e| {
            matches!(e, Event::AlarmPermissionDenied { .. })
        })
        .await;
        tx.send(AppCommand::Shutdown).await.unwrap();
    };
    tokio::join!(app.run(rx), script);

    let settings = Settings::new(Database::open_at(&path).unwrap());
    assert!(!settings.alarm().active);
}

#[tokio::test(start_paused = true)]
async fn arming_persists_and_schedules_in_future() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("momentum.db");
    let (app, _) = build_app(&path, Config::default(), StaticPermission::granted(), 1);
    let mut events = app.subscribe();
    let (tx, rx) = mpsc::channel(16);

    let script = async {
        tx.send(AppCommand::SetTime(TimeOfDay::new(6, 30).unwrap()))
            .await
            .unwrap();
        tx.send(AppCommand::SetActive(true)).await.unwrap();
        let armed = wait_for(&mut events, |e| matches!(e, Event::AlarmArmed { .. })).await;
        if let Event::AlarmArmed { fires_at, at } = armed {
            assert!(fires_at > at);
            assert!(fires_at - at <= chrono::Duration::hours(24));
        }
        tx.send(AppCommand::Shutdown).await.unwrap();
    };
    tokio::join!(app.run(rx), script);

    let alarm = Settings::new(Database::open_at(&path).unwrap()).alarm();
    assert!(alarm.active);
    assert_eq!(alarm.time_of_day.to_string(), "06:30");
}

#[tokio::test(start_paused = true)]
async fn disarm_with_abort_policy_cancels_running_challenge() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("momentum.db");
    let mut config = Config::default();
    config.alarm.disarm_policy = DisarmPolicy::AbortActive;
    let (app, sender) = build_app(&path, config, StaticPermission::granted(), 2);
    let mut events = app.subscribe();
    let (tx, rx) = mpsc::channel(16);

    let script = async {
        tx.send(AppCommand::FireNow).await.unwrap();
        wait_for(&mut events, |e| matches!(e, Event::ChallengeStarted { .. })).await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        tx.send(AppCommand::SetActive(false)).await.unwrap();
        wait_for(&mut events, |e| matches!(e, Event::AlarmDisarmed { .. })).await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        tx.send(AppCommand::Shutdown).await.unwrap();
    };
    tokio::join!(app.run(rx), script);

    assert_eq!(sender.sends.load(Ordering::SeqCst), 0);
    let records = history(&path);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, ChallengeOutcome::Aborted);
}

#[tokio::test(start_paused = true)]
async fn disarm_with_default_policy_lets_challenge_finish() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("momentum.db");
    let (app, sender) = build_app(&path, Config::default(), StaticPermission::granted(), 2);
    let mut events = app.subscribe();
    let (tx, rx) = mpsc::channel(16);

    let script = async {
        tx.send(AppCommand::FireNow).await.unwrap();
        wait_for(&mut events, |e| matches!(e, Event::ChallengeStarted { .. })).await;
        tx.send(AppCommand::SetActive(false)).await.unwrap();
        wait_for(&mut events, |e| {
            matches!(e, Event::NotificationFinished { .. })
        })
        .await;
        tx.send(AppCommand::Shutdown).await.unwrap();
    };
    tokio::join!(app.run(rx), script);

    assert_eq!(sender.sends.load(Ordering::SeqCst), 1);
    assert_eq!(history(&path)[0].outcome, ChallengeOutcome::Failure);
}

#[tokio::test(start_paused = true)]
async fn shutdown_with_default_policy_waits_for_running_challenge() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("momentum.db");
    let (app, sender) = build_app(&path, Config::default(), StaticPermission::granted(), 2);
    let mut events = app.subscribe();
    let (tx, rx) = mpsc::channel(16);

    let script = async {
        tx.send(AppCommand::FireNow).await.unwrap();
        wait_for(&mut events, |e| matches!(e, Event::ChallengeStarted { .. })).await;
        tx.send(AppCommand::SetActive(false)).await.unwrap();
        wait_for(&mut events, |e| matches!(e, Event::AlarmDisarmed { .. })).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        tx.send(AppCommand::Shutdown).await.unwrap();
    };
    tokio::join!(app.run(rx), script);

    assert_eq!(sender.sends.load(Ordering::SeqCst), 1);
    let records = history(&path);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, ChallengeOutcome::Failure);
    assert_eq!(records[0].notification.as_deref(), Some("sent"));
}

#[tokio::test]
async fn arming_without_permission_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("momentum.db");
    let (mut app, _) = build_app(&path, Config::default(), StaticPermission::denied(), 1);

    assert!(matches!(
        app.set_active(true),
        Err(momentum_core::CoreError::PermissionDenied)
    ));
    assert!(!app.settings().alarm().active);
    assert!(!app.scheduler().is_armed());
}
