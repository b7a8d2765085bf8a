//! Session settings
//!
//! Read-only inputs to a gateway session, used to build the Identify
//! handshake at Hello time.

use crate::intents::Intents;
use crate::protocol::{IdentifyPayload, IdentifyProperties, StatusUpdatePayload};
use beacon_common::GatewayConfig;

/// Read-only settings for a gateway session
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Bot authentication token
    pub token: String,
    /// Shard index of this connection
    pub shard_id: u32,
    /// Total number of shards
    pub shard_total: u32,
    /// Guild member count above which offline members are not sent
    pub large_threshold: u32,
    /// Initial presence declared at Identify
    pub presence: Option<StatusUpdatePayload>,
    /// Intents bitmask declared at Identify
    pub intents: Intents,
    /// Whether to subscribe to presence/typing events in guilds
    pub guild_subscriptions: bool,
    /// Unix time in milliseconds since the client went idle
    pub idle_since: Option<u64>,
}

impl GatewaySettings {
    /// Create settings with everything defaulted except the token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            shard_id: 0,
            shard_total: 1,
            large_threshold: 250,
            presence: None,
            intents: Intents::empty(),
            guild_subscriptions: true,
            idle_since: None,
        }
    }

    /// Build settings from loaded configuration
    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            token: config.token.clone(),
            shard_id: config.shard_id,
            shard_total: config.shard_total,
            large_threshold: config.large_threshold,
            presence: None,
            intents: Intents::from_bits_truncate(config.intents),
            guild_subscriptions: config.guild_subscriptions,
            idle_since: None,
        }
    }

    /// Build the Identify payload sent in response to Hello
    ///
    /// The client always sends text frames, so compression is never
    /// requested.
    #[must_use]
    pub fn identify(&self) -> IdentifyPayload {
        let presence = self.presence.clone().map(|mut p| {
            p.since = p.since.or(self.idle_since);
            p
        });

        IdentifyPayload {
            token: self.token.clone(),
            properties: IdentifyProperties::default(),
            compress: false,
            large_threshold: self.large_threshold,
            shard: (self.shard_id, self.shard_total),
            presence,
            guild_subscriptions: self.guild_subscriptions,
            intents: self.intents,
        }
    }
}
