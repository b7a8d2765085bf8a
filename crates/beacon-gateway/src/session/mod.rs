//! Gateway session
//!
//! Session state, the state machine stage, and the completion handles the
//! reconnect supervisor observes.

mod handles;
mod machine;
mod state;

pub use handles::{OutcomeHandle, SessionHandles, SessionOutcome, StartedHandle};
pub use machine::GatewaySession;
pub use state::{ResumeData, SessionState};
