//! WireGuard peer lookup service.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────┐
//!                        │                   wg-share                    │
//!                        │                                               │
//!     POST /find         │  ┌──────────┐   ┌─────────┐   ┌────────────┐  │
//!     ───────────────────┼─▶│ listener │──▶│  http   │──▶│   lookup   │  │
//!     (one per address)  │  │  (net)   │   │ router  │   │  service   │  │
//!                        │  └────┬─────┘   └─────────┘   └─────┬──────┘  │
//!                        │       │                             │         │
//!                        │  ┌────▼───────────┐          ┌──────▼──────┐  │
//!                        │  │ listener group │          │ device ctrl │──┼──▶ wg show <dev> dump
//!                        │  │ run/close/     │          │ (wg/static) │  │
//!                        │  │ shutdown       │          └─────────────┘  │
//!                        │  └────────────────┘                           │
//!                        └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::time::Instant;

use wg_share::config::{load_config, validate_config, ConfigError, ServiceConfig};
use wg_share::lifecycle::{signals, startup};
use wg_share::observability::logging;

#[derive(Parser)]
#[command(name = "wg-share")]
#[command(about = "Share WireGuard peer endpoints over HTTP", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// WireGuard device to serve (overrides the config file)
    #[arg(short, long)]
    device: Option<String>,

    /// Listening port (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to listen on, repeatable (default: all addresses of the device)
    #[arg(short, long = "address")]
    addresses: Vec<String>,
}

impl Cli {
    fn into_config(self) -> Result<ServiceConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ServiceConfig::default(),
        };

        if let Some(device) = self.device {
            config.device = device;
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if !self.addresses.is_empty() {
            config.listener.addresses = self.addresses;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;
    logging::init(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "wg-share starting");
    tracing::info!(
        device = %config.device,
        backend = ?config.backend,
        port = config.listener.port,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let control = startup::device_control(&config)?;
    let group = Arc::new(startup::configure(&config, control)?);

    let mut runner = tokio::spawn({
        let group = Arc::clone(&group);
        async move { group.run().await }
    });

    let outcome = tokio::select! {
        outcome = &mut runner => outcome,
        _ = signals::shutdown_signal() => {
            let grace = Duration::from_secs(config.timeouts.shutdown_secs);
            tracing::info!(grace_secs = grace.as_secs(), "Shutting down");

            tokio::select! {
                result = group.shutdown(Instant::now() + grace) => {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "Graceful shutdown incomplete");
                    }
                }
                _ = signals::shutdown_signal() => {
                    tracing::warn!("Second signal received, closing immediately");
                    if let Err(e) = group.close() {
                        tracing::warn!(error = %e, "Close incomplete");
                    }
                }
            }
            runner.await
        }
    };

    outcome??;
    tracing::info!("Shutdown complete");
    Ok(())
}
