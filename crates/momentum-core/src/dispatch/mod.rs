//! Trigger dispatch and the per-challenge session actor.

mod dispatcher;
mod session;

pub use dispatcher::{DispatchTiming, TriggerDispatcher};
pub use session::{SessionCommand, SessionHandle, SessionReport};
