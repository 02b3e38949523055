//! Email relay for Momentum Maker.
//!
//! Accepts failure notices from the alarm app over HTTP and hands them to a
//! [`Mailer`](mailer::Mailer).

pub mod config;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod router;
pub mod server;
pub mod state;

pub use config::RelayConfig;
pub use error::{ConfigError, MailError, RelayError};
pub use mailer::{Email, HttpMailer, LogMailer, Mailer};
pub use router::build_router;
pub use server::{start_server, ServerError};
pub use state::AppState;
