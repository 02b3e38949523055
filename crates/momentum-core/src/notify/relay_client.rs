//! HTTP client for the email relay.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::notifier::EmailSender;
use crate::error::{ConfigError, NotifyError};
use crate::storage::config::RelayConfig;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FailureEmailRequest<'a> {
    recipient: &'a str,
    custom_message: &'a str,
    custom_subject: &'a str,
}

/// Body returned by `POST /send-failure-email`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    pub success: bool,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body returned by `GET /health-check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub success: bool,
    pub message: String,
}

pub struct RelayClient {
    client: Client,
    base_url: String,
    health_timeout: Duration,
}

impl RelayClient {
    /// Client for the relay at `base_url` (e.g. `http://127.0.0.1:3000/api`).
    ///
    /// # Errors
    /// Returns an error if the URL does not parse or the HTTP client cannot
    /// be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let parsed = Url::parse(base_url).map_err(|e| ConfigError::InvalidValue {
            key: "relay.url".into(),
            message: e.to_string(),
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "relay".into(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            health_timeout: Duration::from_secs(5),
        })
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self, ConfigError> {
        let mut client = Self::new(&config.url, Duration::from_secs(config.timeout_secs))?;
        client.health_timeout = Duration::from_secs(config.health_timeout_secs);
        Ok(client)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Ask the relay to send the failure email.
    pub async fn send_failure_email(
        &self,
        recipient: &str,
        subject: &str,
        message: &str,
    ) -> Result<Option<String>, NotifyError> {
        let body = FailureEmailRequest {
            recipient,
            custom_message: message,
            custom_subject: subject,
        };
        let resp = self
            .client
            .post(self.endpoint("send-failure-email"))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<RelayResponse>(&text)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or(text);
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: RelayResponse = resp
            .json()
            .await
            .map_err(|e| NotifyError::InvalidResponse(e.to_string()))?;
        if !parsed.success {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                message: parsed
                    .error
                    .unwrap_or_else(|| "relay reported failure".into()),
            });
        }
        Ok(parsed.message_id)
    }

    /// Check that the relay is up.
    pub async fn health_check(&self) -> Result<HealthStatus, NotifyError> {
        let resp = self
            .client
            .get(self.endpoint("health-check"))
            .timeout(self.health_timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }
        resp.json()
            .await
            .map_err(|e| NotifyError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl EmailSender for RelayClient {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<Option<String>, NotifyError> {
        self.send_failure_email(recipient, subject, body).await
    }
}
