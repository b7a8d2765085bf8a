//! Application configuration structs
//!
//! Loads configuration from environment variables.

use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: GatewayConfig,
    pub reconnect: ReconnectConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Production selects the JSON log format at startup
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Gateway connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// WebSocket endpoint of the gateway
    #[serde(default = "default_gateway_url")]
    pub url: String,

    /// Bot authentication token
    pub token: String,

    /// Shard index of this connection
    #[serde(default)]
    pub shard_id: u32,

    /// Total number of shards
    #[serde(default = "default_shard_total")]
    pub shard_total: u32,

    /// Guild member count above which offline members are not sent
    #[serde(default = "default_large_threshold")]
    pub large_threshold: u32,

    /// Intents bitmask declared at Identify
    #[serde(default)]
    pub intents: u64,

    /// Whether to subscribe to guild presence/typing events
    #[serde(default = "default_guild_subscriptions")]
    pub guild_subscriptions: bool,

    /// Log every raw frame received from the gateway at debug level
    #[serde(default)]
    pub log_received_ws: bool,

    /// Log every raw frame sent to the gateway at debug level
    #[serde(default)]
    pub log_sent_ws: bool,
}

/// Reconnect supervisor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    /// Initial delay between reconnection attempts in milliseconds
    #[serde(default = "default_reconnect_delay_ms")]
    pub delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier applied per failed start
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Delay applied before reconnecting after an Invalid Session
    #[serde(default = "default_invalid_session_delay_ms")]
    pub invalid_session_delay_ms: u64,
}

impl ReconnectConfig {
    /// Calculates the reconnect delay for a given attempt using exponential backoff.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped = delay.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(capped)
    }

    /// Returns the Invalid-Session wait as a Duration.
    #[must_use]
    pub fn invalid_session_delay(&self) -> Duration {
        Duration::from_millis(self.invalid_session_delay_ms)
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_reconnect_delay_ms(),
            max_delay_ms: default_max_reconnect_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            invalid_session_delay_ms: default_invalid_session_delay_ms(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "beacon".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_gateway_url() -> String {
    "wss://gateway.discord.gg/?v=10&encoding=json".to_string()
}

fn default_shard_total() -> u32 {
    1
}

fn default_large_threshold() -> u32 {
    250
}

fn default_guild_subscriptions() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    1_000
}

fn default_max_reconnect_delay_ms() -> u64 {
    60_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_invalid_session_delay_ms() -> u64 {
    5_000
}

fn env_flag(name: &'static str) -> bool {
    env::var(name)
        .ok()
        .map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: env::var("APP_ENV")
                    .ok()
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "staging" => Some(Environment::Staging),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
            },
            gateway: GatewayConfig {
                url: env::var("GATEWAY_URL").unwrap_or_else(|_| default_gateway_url()),
                token: env::var("GATEWAY_TOKEN")
                    .map_err(|_| ConfigError::MissingVar("GATEWAY_TOKEN"))?,
                shard_id: env::var("SHARD_ID")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
                shard_total: env::var("SHARD_TOTAL")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_shard_total),
                large_threshold: env::var("LARGE_THRESHOLD")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_large_threshold),
                intents: env::var("GATEWAY_INTENTS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
                guild_subscriptions: env::var("GUILD_SUBSCRIPTIONS")
                    .ok()
                    .map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes"))
                    .unwrap_or_else(default_guild_subscriptions),
                log_received_ws: env_flag("LOG_RECEIVED_WS"),
                log_sent_ws: env_flag("LOG_SENT_WS"),
            },
            reconnect: ReconnectConfig {
                delay_ms: env::var("RECONNECT_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_reconnect_delay_ms),
                max_delay_ms: env::var("MAX_RECONNECT_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_max_reconnect_delay_ms),
                backoff_multiplier: env::var("BACKOFF_MULTIPLIER")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_backoff_multiplier),
                invalid_session_delay_ms: env::var("INVALID_SESSION_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_invalid_session_delay_ms),
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
