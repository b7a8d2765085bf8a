//! Gateway intents bitmask
//!
//! Intents declared at Identify select which dispatch events the server
//! delivers to this session.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    /// Gateway intents
    ///
    /// Sent as a 64-bit integer in the Identify payload.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Intents: u64 {
        /// Guild create/update/delete, roles, channels
        const GUILDS                    = 1 << 0;
        /// Member join/update/leave (privileged)
        const GUILD_MEMBERS             = 1 << 1;
        /// Bans and audit-log moderation events
        const GUILD_MODERATION          = 1 << 2;
        /// Emoji and sticker updates
        const GUILD_EMOJIS_AND_STICKERS = 1 << 3;
        /// Integration updates
        const GUILD_INTEGRATIONS        = 1 << 4;
        /// Webhook updates
        const GUILD_WEBHOOKS            = 1 << 5;
        /// Invite create/delete
        const GUILD_INVITES             = 1 << 6;
        /// Voice state updates
        const GUILD_VOICE_STATES        = 1 << 7;
        /// Presence updates (privileged)
        const GUILD_PRESENCES           = 1 << 8;
        /// Guild message create/update/delete
        const GUILD_MESSAGES            = 1 << 9;
        /// Guild message reactions
        const GUILD_MESSAGE_REACTIONS   = 1 << 10;
        /// Guild typing notifications
        const GUILD_MESSAGE_TYPING      = 1 << 11;
        /// Direct message create/update/delete
        const DIRECT_MESSAGES           = 1 << 12;
        /// Direct message reactions
        const DIRECT_MESSAGE_REACTIONS  = 1 << 13;
        /// Direct message typing notifications
        const DIRECT_MESSAGE_TYPING     = 1 << 14;
        /// Message content in dispatch payloads (privileged)
        const MESSAGE_CONTENT           = 1 << 15;

        /// Intents that require explicit allow-listing on the application
        const PRIVILEGED = Self::GUILD_MEMBERS.bits()
            | Self::GUILD_PRESENCES.bits()
            | Self::MESSAGE_CONTENT.bits();
    }
}

impl Intents {
    /// Check whether this set contains any privileged intent
    #[must_use]
    pub fn has_privileged(&self) -> bool {
        self.intersects(Self::PRIVILEGED)
    }

    /// The non-privileged subset of this set
    #[must_use]
    pub fn unprivileged(&self) -> Self {
        self.difference(Self::PRIVILEGED)
    }
}

impl Default for Intents {
    fn default() -> Self {
        Self::empty()
    }
}

impl Serialize for Intents {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.bits())
    }
}

impl<'de> Deserialize<'de> for Intents {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = u64::deserialize(deserializer)?;
        Ok(Self::from_bits_truncate(bits))
    }
}
