//! HTTP handlers.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/health-check` | Liveness probe |
//! | `POST` | `/api/send-failure-email` | Deliver one failure email |

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::RelayError;
use crate::mailer::Email;
use crate::state::AppState;

pub const DEFAULT_SUBJECT: &str = "Momentum Maker - Wecker-Versagen!";
pub const REASON_SUBJECT: &str = "Momentum Maker - Wake Up Failure!";

/// Body of `POST /api/send-failure-email`.
///
/// Clients send either a ready message (`customMessage`, `customSubject`)
/// or only a `reason`, which is wrapped in the standard failure text.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureEmailRequest {
    #[serde(default)]
    pub recipient: String,
    pub custom_message: Option<String>,
    pub custom_subject: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendResponse {
    pub fn sent(message_id: String) -> Self {
        Self {
            success: true,
            message_id: Some(message_id),
            error: None,
        }
    }

    pub fn failed(error: String) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub message: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        message: "Server is running",
    })
}

pub async fn send_failure_email(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FailureEmailRequest>, JsonRejection>,
) -> Result<Json<SendResponse>, RelayError> {
    let Json(request) = payload.map_err(|e| RelayError::BadRequest(e.body_text()))?;
    let email = compose(&request, &state.from)?;

    match state.mailer.send(&email).await {
        Ok(id) => {
            info!(to = %email.to, message_id = %id, "failure email sent");
            Ok(Json(SendResponse::sent(id)))
        }
        Err(e) => {
            warn!(to = %email.to, error = %e, "failure email not sent");
            Err(e.into())
        }
    }
}

/// Turn a request into the message to deliver.
pub fn compose(request: &FailureEmailRequest, from: &str) -> Result<Email, RelayError> {
    let recipient = request.recipient.trim();
    if recipient.is_empty() {
        return Err(RelayError::BadRequest("recipient is required".into()));
    }

    let (subject, text, html) = match (&request.custom_message, &request.reason) {
        (Some(message), _) => {
            let subject = request
                .custom_subject
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SUBJECT.into());
            let html = format!("<p>{}</p>", escape_html(message));
            (subject, message.clone(), html)
        }
        (None, Some(reason)) => {
            let text = format!(
                "You failed to wake up on time! This email has been sent because you {reason}.\n\n\
                 Time to face the consequences of your actions!\n\n\
                 Best regards,\nYour Momentum Maker"
            );
            let html = format!(
                "<h1>Wake Up Failure!</h1>\
                 <p>You failed to wake up on time! This email has been sent because you {}.</p>\
                 <p>Time to face the consequences of your actions!</p>\
                 <p>Best regards,<br>Your Momentum Maker</p>",
                escape_html(reason)
            );
            let subject = request
                .custom_subject
                .clone()
                .unwrap_or_else(|| REASON_SUBJECT.into());
            (subject, text, html)
        }
        (None, None) => {
            return Err(RelayError::BadRequest(
                "either customMessage or reason is required".into(),
            ))
        }
    };

    Ok(Email {
        from: from.to_string(),
        to: recipient.to_string(),
        subject,
        text,
        html,
    })
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\n' => out.push_str("<br>"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(recipient: &str) -> FailureEmailRequest {
        FailureEmailRequest {
            recipient: recipient.into(),
            ..Default::default()
        }
    }

    #[test]
    fn custom_message_is_sent_verbatim() {
        let email = compose(
            &FailureEmailRequest {
                custom_message: Some("Ich habe verschlafen.".into()),
                custom_subject: Some("Peinlich".into()),
                ..request(" friend@example.com ")
            },
            "alarm@example.com",
        )
        .unwrap();
        assert_eq!(email.to, "friend@example.com");
        assert_eq!(email.subject, "Peinlich");
        assert_eq!(email.text, "Ich habe verschlafen.");
        assert_eq!(email.html, "<p>Ich habe verschlafen.</p>");
    }

    #[test]
    fn blank_subject_falls_back_to_default() {
        let email = compose(
            &FailureEmailRequest {
                custom_message: Some("x".into()),
                custom_subject: Some("  ".into()),
                ..request("friend@example.com")
            },
            "a",
        )
        .unwrap();
        assert_eq!(email.subject, DEFAULT_SUBJECT);
    }

    #[test]
    fn reason_is_wrapped_in_template() {
        let email = compose(
            &FailureEmailRequest {
                reason: Some("did not answer the quiz".into()),
                ..request("friend@example.com")
            },
            "a",
        )
        .unwrap();
        assert_eq!(email.subject, REASON_SUBJECT);
        assert!(email.text.contains("because you did not answer the quiz."));
        assert!(email.html.starts_with("<h1>Wake Up Failure!</h1>"));
    }

    #[test]
    fn rejects_missing_recipient_or_content() {
        assert!(matches!(
            compose(&request("  "), "a"),
            Err(RelayError::BadRequest(_))
        ));
        assert!(matches!(
            compose(&request("friend@example.com"), "a"),
            Err(RelayError::BadRequest(_))
        ));
    }

    #[test]
    fn html_is_escaped() {
        assert_eq!(escape_html("<b>&\"x\"</b>\n"), "&lt;b&gt;&amp;&quot;x&quot;&lt;/b&gt;<br>");
    }
}
