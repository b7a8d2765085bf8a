//! Event payload definitions
//!
//! Payloads for the dispatch events that affect session state. All other
//! event payloads pass through the client as opaque JSON.

use serde::{Deserialize, Serialize};

/// READY event payload
///
/// Sent after successful Identify. Deliberately lenient: every field is
/// defaulted so a malformed payload yields a Ready without a session id
/// (the session degrades to unresumable) instead of failing the stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadyEvent {
    /// Gateway protocol version
    #[serde(default)]
    pub v: u32,

    /// Session ID for resuming
    #[serde(default)]
    pub session_id: Option<String>,

    /// Gateway URL to use when resuming
    #[serde(default)]
    pub resume_gateway_url: Option<String>,

    /// Current user
    #[serde(default)]
    pub user: Option<UserPayload>,

    /// Guilds the user is in (initially unavailable)
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
}

/// User data included in READY
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPayload {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

/// Unavailable guild stub in READY
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnavailableGuild {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub unavailable: bool,
}
