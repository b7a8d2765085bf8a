//! Client payload definitions
//!
//! Defines the payload structures carried in the `d` field of gateway
//! envelopes sent by the client.

use crate::intents::Intents;
use serde::{Deserialize, Serialize};

/// Payload for op 10 (Hello)
///
/// Sent by the server immediately after connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

impl HelloPayload {
    /// Create a Hello payload with the given interval
    #[must_use]
    pub fn with_interval(heartbeat_interval: u64) -> Self {
        Self { heartbeat_interval }
    }
}

/// Client connection properties sent in Identify
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyProperties {
    /// Operating system
    pub os: String,

    /// Library or client name
    pub browser: String,

    /// Device name
    pub device: String,
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "beacon".to_string(),
            device: "beacon".to_string(),
        }
    }
}

/// Payload for op 2 (Identify)
///
/// Sent by the client to authenticate a fresh session after Hello.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifyPayload {
    /// Bot authentication token
    pub token: String,

    /// Client properties
    pub properties: IdentifyProperties,

    /// Whether the client accepts zlib-compressed frames
    #[serde(default)]
    pub compress: bool,

    /// Guild member count above which offline members are not sent
    pub large_threshold: u32,

    /// Shard tuple `[shard_id, shard_total]`
    pub shard: (u32, u32),

    /// Initial presence for the session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence: Option<StatusUpdatePayload>,

    /// Whether to subscribe to presence/typing events in guilds
    #[serde(default)]
    pub guild_subscriptions: bool,

    /// Intents bitmask
    pub intents: Intents,
}

/// Payload for op 6 (Resume)
///
/// Sent by the client to re-attach a dropped session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePayload {
    /// Bot authentication token
    pub token: String,

    /// Session ID to resume
    pub session_id: String,

    /// Last received sequence number
    pub seq: u64,
}

/// Online status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Online,
    Dnd,
    Idle,
    Invisible,
    Offline,
}

/// Activity types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ActivityType {
    Playing,
    Streaming,
    Listening,
    Watching,
    Custom,
    Competing,
}

impl From<ActivityType> for u8 {
    fn from(kind: ActivityType) -> Self {
        match kind {
            ActivityType::Playing => 0,
            ActivityType::Streaming => 1,
            ActivityType::Listening => 2,
            ActivityType::Watching => 3,
            ActivityType::Custom => 4,
            ActivityType::Competing => 5,
        }
    }
}

impl TryFrom<u8> for ActivityType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Playing),
            1 => Ok(Self::Streaming),
            2 => Ok(Self::Listening),
            3 => Ok(Self::Watching),
            4 => Ok(Self::Custom),
            5 => Ok(Self::Competing),
            other => Err(format!("invalid activity type: {other}")),
        }
    }
}

/// An activity shown in a presence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Activity text
    pub name: String,

    /// Activity type
    #[serde(rename = "type")]
    pub kind: ActivityType,

    /// Stream URL, only valid for `Streaming`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Activity {
    /// Create a "Playing ..." activity
    #[must_use]
    pub fn playing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ActivityType::Playing,
            url: None,
        }
    }

    /// Check whether the client is allowed to send this activity
    ///
    /// Custom activities and activities with an empty name are rejected by
    /// the gateway.
    #[must_use]
    pub fn can_send(&self) -> bool {
        self.kind != ActivityType::Custom && !self.name.trim().is_empty()
    }
}

/// Payload for op 3 (Status Update)
///
/// Sent by the client to update its presence; also embedded in Identify.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdatePayload {
    /// Unix time in milliseconds since the client went idle
    #[serde(default)]
    pub since: Option<u64>,

    /// Activities to display
    #[serde(default)]
    pub activities: Vec<Activity>,

    /// New online status
    pub status: Status,

    /// Whether the client is AFK
    #[serde(default)]
    pub afk: bool,
}

impl StatusUpdatePayload {
    /// Create a plain online presence with no activity
    #[must_use]
    pub fn online() -> Self {
        Self {
            since: None,
            activities: Vec::new(),
            status: Status::Online,
            afk: false,
        }
    }
}

/// Payload for op 8 (Request Guild Members)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestGuildMembersPayload {
    /// Guild to request members for
    pub guild_id: String,

    /// Username prefix filter; empty string matches all members
    #[serde(default)]
    pub query: String,

    /// Maximum number of members to return; 0 for no limit
    #[serde(default)]
    pub limit: u32,
}

/// Payload for op 4 (Voice State Update)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStateUpdatePayload {
    /// Guild the voice channel belongs to
    pub guild_id: String,

    /// Channel to join, or None to disconnect
    pub channel_id: Option<String>,

    /// Whether the client is muted
    #[serde(default)]
    pub self_mute: bool,

    /// Whether the client is deafened
    #[serde(default)]
    pub self_deaf: bool,
}
