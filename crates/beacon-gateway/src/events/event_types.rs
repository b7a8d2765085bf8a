//! Gateway event types
//!
//! The event type names carried in the `t` field of dispatch envelopes that
//! affect session state. Every other event name is routed downstream as an
//! opaque string.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State-affecting gateway event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Sent after successful Identify
    Ready,
    /// Sent after successful Resume
    Resumed,
}

impl EventType {
    /// Get the string representation of the event type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Resumed => "RESUMED",
        }
    }

    /// Parse an event type from its wire name
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "READY" => Some(Self::Ready),
            "RESUMED" => Some(Self::Resumed),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
