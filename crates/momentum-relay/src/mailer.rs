//! Outgoing mail delivery.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::MailApiConfig;
use crate::error::MailError;

const MAIL_API_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Delivers one message and returns its message id.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<String, MailError>;
}

#[derive(Debug, Deserialize)]
struct MailApiResponse {
    #[serde(alias = "messageId", alias = "message_id")]
    id: Option<String>,
}

/// Posts messages as JSON to an HTTP mail API with an optional bearer token.
pub struct HttpMailer {
    client: reqwest::Client,
    config: MailApiConfig,
}

impl HttpMailer {
    pub fn new(config: MailApiConfig) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(MAIL_API_TIMEOUT)
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<String, MailError> {
        let mut request = self.client.post(&self.config.url).json(email);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "mail API rejected message");
            return Err(MailError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        // Some APIs answer 202 with an empty body.
        let body = response.text().await?;
        let id = serde_json::from_str::<MailApiResponse>(&body)
            .ok()
            .and_then(|r| r.id)
            .unwrap_or_else(|| format!("<{}@momentum-relay>", Uuid::new_v4()));
        info!(to = %email.to, message_id = %id, "mail delivered");
        Ok(id)
    }
}

/// Logs messages instead of delivering them and keeps them in memory.
#[derive(Default)]
pub struct LogMailer {
    outbox: Mutex<Vec<Email>>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Email> {
        self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<String, MailError> {
        let id = format!("<{}@momentum-relay.local>", Uuid::new_v4());
        info!(to = %email.to, subject = %email.subject, message_id = %id, "mail logged, not delivered");
        self.outbox
            .lock()
            .map_err(|_| MailError::Other("outbox lock poisoned".into()))?
            .push(email.clone());
        Ok(id)
    }
}
