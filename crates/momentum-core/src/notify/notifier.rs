use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::lock::NotificationLock;
use crate::error::NotifyError;
use crate::storage::EmailConfig;

/// External email delivery. Returns the provider's message id when it has one.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<Option<String>, NotifyError>;
}

/// What happened to a failure notification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotifyOutcome {
    Sent { message_id: Option<String> },
    Failed { error: String },
    /// Email disabled or no recipient configured.
    Skipped { reason: String },
    /// Another caller already holds or spent the lock.
    AlreadyHandled,
}

/// Sends the single failure email for one challenge.
///
/// Safe to call from the challenge timeout and the dispatcher's safety net
/// at the same time: only the first caller gets past the lock, and the
/// attempt is consumed whatever its outcome.
pub struct OutcomeNotifier {
    sender: Arc<dyn EmailSender>,
    email: Option<EmailConfig>,
    timeout: Duration,
    lock: NotificationLock,
}

impl OutcomeNotifier {
    pub fn new(sender: Arc<dyn EmailSender>, email: Option<EmailConfig>, timeout: Duration) -> Self {
        Self {
            sender,
            email,
            timeout,
            lock: NotificationLock::new(),
        }
    }

    pub fn is_sent(&self) -> bool {
        self.lock.is_sent()
    }

    pub async fn notify_failure(&self) -> NotifyOutcome {
        let Some(_guard) = self.lock.try_acquire() else {
            debug!("failure notification already handled");
            return NotifyOutcome::AlreadyHandled;
        };

        let email = match &self.email {
            Some(email) if email.is_deliverable() => email,
            _ => {
                info!("failure email skipped: disabled or no recipient configured");
                return NotifyOutcome::Skipped {
                    reason: "email notifications disabled or incomplete".into(),
                };
            }
        };

        info!(recipient = %email.recipient, "sending failure email");
        let send = self.sender.send(
            &email.recipient,
            &email.custom_subject,
            &email.custom_message,
        );
        let result = match tokio::time::timeout(self.timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout {
                secs: self.timeout.as_secs(),
            }),
        };

        match result {
            Ok(message_id) => {
                info!(message_id = message_id.as_deref().unwrap_or("-"), "failure email sent");
                NotifyOutcome::Sent { message_id }
            }
            Err(e) => {
                warn!(error = %e, "failure email not sent; not retrying");
                NotifyOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct SlowSender {
        calls: AtomicU32,
        delay: Duration,
        fail: bool,
    }

    impl SlowSender {
        fn new(delay: Duration, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                delay,
                fail,
            })
        }
    }

    #[async_trait]
    impl EmailSender for SlowSender {
        async fn send(&self, _: &str, _: &str, _: &str) -> Result<Option<String>, NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(NotifyError::Rejected {
                    status: 500,
                    message: "smtp down".into(),
                })
            } else {
                Ok(Some("msg-1".into()))
            }
        }
    }

    fn email() -> Option<EmailConfig> {
        Some(EmailConfig {
            enabled: true,
            recipient: "friend@example.com".into(),
            custom_message: "I overslept".into(),
            custom_subject: "Wake-up failure".into(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_calls_send_once() {
        let sender = SlowSender::new(Duration::from_secs(2), false);
        let notifier = OutcomeNotifier::new(sender.clone(), email(), Duration::from_secs(30));

        let (a, b) = tokio::join!(notifier.notify_failure(), notifier.notify_failure());

        assert_eq!(sender.calls.load(Ordering::SeqCst), 1);
        let outcomes = [a, b];
        assert!(outcomes.contains(&NotifyOutcome::Sent {
            message_id: Some("msg-1".into())
        }));
        assert!(outcomes.contains(&NotifyOutcome::AlreadyHandled));
        assert!(notifier.is_sent());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_send_is_not_retried() {
        let sender = SlowSender::new(Duration::ZERO, true);
        let notifier = OutcomeNotifier::new(sender.clone(), email(), Duration::from_secs(30));

        assert!(matches!(
            notifier.notify_failure().await,
            NotifyOutcome::Failed { .. }
        ));
        assert_eq!(notifier.notify_failure().await, NotifyOutcome::AlreadyHandled);
        assert_eq!(sender.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_relay_times_out() {
        let sender = SlowSender::new(Duration::from_secs(120), false);
        let notifier = OutcomeNotifier::new(sender.clone(), email(), Duration::from_secs(30));

        let outcome = notifier.notify_failure().await;
        assert_eq!(
            outcome,
            NotifyOutcome::Failed {
                error: NotifyError::Timeout { secs: 30 }.to_string()
            }
        );
        assert!(notifier.is_sent());
    }

    #[tokio::test]
    async fn disabled_email_is_skipped() {
        let sender = SlowSender::new(Duration::ZERO, false);
        let mut config = email();
        if let Some(c) = config.as_mut() {
            c.enabled = false;
        }
        let notifier = OutcomeNotifier::new(sender.clone(), config, Duration::from_secs(30));

        assert!(matches!(
            notifier.notify_failure().await,
            NotifyOutcome::Skipped { .. }
        ));
        assert_eq!(sender.calls.load(Ordering::SeqCst), 0);
        assert_eq!(notifier.notify_failure().await, NotifyOutcome::AlreadyHandled);
    }

    #[tokio::test]
    async fn blank_recipient_is_skipped() {
        let sender = SlowSender::new(Duration::ZERO, false);
        let mut config = email();
        if let Some(c) = config.as_mut() {
            c.recipient = "   ".into();
        }
        let notifier = OutcomeNotifier::new(sender.clone(), config, Duration::from_secs(30));

        assert!(matches!(
            notifier.notify_failure().await,
            NotifyOutcome::Skipped { .. }
        ));
        assert_eq!(sender.calls.load(Ordering::SeqCst), 0);
    }
}
