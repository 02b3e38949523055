//! Failure notification: the at-most-once lock, the notifier that owns it,
//! and the HTTP client for the email relay.

mod lock;
mod notifier;
mod relay_client;

pub use lock::{LockGuard, NotificationLock};
pub use notifier::{EmailSender, NotifyOutcome, OutcomeNotifier};
pub use relay_client::{HealthStatus, RelayClient, RelayResponse};
