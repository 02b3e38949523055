//! Error types for the relay.
//!
//! [`RelayError`] converts into an HTTP response carrying the same
//! `{ success: false, error }` body the email endpoint returns on success
//! paths, so clients parse a single shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::handlers::SendResponse;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Delivery failures reported by a [`Mailer`](crate::mailer::Mailer).
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail API rejected the message ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Mail(#[from] MailError),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Mail(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = SendResponse::failed(self.to_string());
        (status, Json(body)).into_response()
    }
}
