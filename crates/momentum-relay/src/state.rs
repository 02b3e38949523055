//! Shared state handed to every handler.

use std::sync::Arc;

use crate::mailer::Mailer;

pub struct AppState {
    pub mailer: Arc<dyn Mailer>,
    /// Sender address put on every outgoing message.
    pub from: String,
}

impl AppState {
    pub fn new(mailer: Arc<dyn Mailer>, from: impl Into<String>) -> Self {
        Self {
            mailer,
            from: from.into(),
        }
    }
}
