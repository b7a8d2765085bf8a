//! # beacon-common
//!
//! Shared utilities for the beacon gateway client: configuration loading and
//! telemetry setup.

pub mod config;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    AppConfig, AppSettings, ConfigError, Environment, GatewayConfig, ReconnectConfig,
};
pub use telemetry::{try_init_tracing_with_config, TracingConfig, TracingError};
