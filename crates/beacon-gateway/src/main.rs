//! Beacon gateway client entry point
//!
//! Run with:
//! ```bash
//! cargo run -p beacon-gateway
//! ```
//!
//! Configuration is loaded from environment variables; `GATEWAY_TOKEN` is
//! required.

use async_trait::async_trait;
use beacon_common::{try_init_tracing_with_config, AppConfig, TracingConfig};
use beacon_gateway::dispatch::{self, EventHandler};
use beacon_gateway::events::DispatchEvent;
use beacon_gateway::protocol::GatewayMessage;
use beacon_gateway::GatewayClient;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Buffer between the session tee and the dispatch sink
const DISPATCH_BUFFER: usize = 256;

#[tokio::main]
async fn main() {
    // Configuration must load first: the environment selects the log format
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let tracing_config = if config.app.env.is_production() {
        TracingConfig::production()
    } else {
        TracingConfig::development()
    };
    if let Err(e) = try_init_tracing_with_config(tracing_config) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    // Run the client
    if let Err(e) = run(config).await {
        error!(error = %e, "Gateway client failed");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        app = %config.app.name,
        env = ?config.app.env,
        shard = config.gateway.shard_id,
        shard_total = config.gateway.shard_total,
        "Starting gateway client"
    );

    let (client, _handle) = GatewayClient::new(&config);

    // Drain the dispatch side of the session tee
    let (dispatch_tx, dispatch_rx) = mpsc::channel(DISPATCH_BUFFER);
    tokio::spawn(dispatch::run_sink(dispatch_rx, Arc::new(LogSink)));

    client.run(dispatch_tx).await?;

    Ok(())
}

/// Sink that logs every dispatched event
struct LogSink;

#[async_trait]
impl EventHandler for LogSink {
    async fn on_message(&self, _message: &GatewayMessage) {}

    async fn on_dispatch(&self, seq: u64, event: &DispatchEvent) {
        info!(seq, event = %event.name(), "event dispatched");
    }
}
