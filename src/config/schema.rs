//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::net::SocketAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::lookup::{PeerId, PeerRecord};

/// Root configuration for the lookup service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// WireGuard device whose peers are served. Its addresses are also
    /// used for listening when `listener.addresses` is empty.
    pub device: String,

    /// Where peer tables come from.
    pub backend: DeviceBackend,

    /// Path of the `wg` tool used by the `wg` backend.
    pub wg_binary: String,

    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Peer tables for the `static` backend.
    pub devices: Vec<StaticDeviceConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            device: "wg0".to_string(),
            backend: DeviceBackend::default(),
            wg_binary: "wg".to_string(),
            listener: ListenerConfig::default(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
            devices: Vec::new(),
        }
    }
}

/// Device-control backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceBackend {
    /// Query the kernel through `wg show <device> dump`.
    #[default]
    Wg,
    /// Serve the tables listed under `[[devices]]`.
    Static,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Port every listener binds to.
    pub port: u16,

    /// IP addresses to listen on. Empty means every address of the device.
    pub addresses: Vec<String>,

    /// Maximum concurrent connections per listener (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            port: 9000,
            addresses: Vec::new(),
            max_connections: 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout in seconds.
    pub request_secs: u64,

    /// Grace period for in-flight requests on shutdown, in seconds.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 10,
            shutdown_secs: 5,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub log_filter: String,

    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "wg_share=info,tower_http=info".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

/// A device served by the `static` backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticDeviceConfig {
    pub name: String,

    #[serde(default)]
    pub peers: Vec<StaticPeerConfig>,
}

/// One peer of a static device.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticPeerConfig {
    /// Base64 public key.
    pub public_key: String,

    /// Endpoint as `ip:port`.
    pub endpoint: Option<String>,

    /// Networks in CIDR notation.
    #[serde(default)]
    pub allowed_ips: Vec<String>,

    pub persistent_keepalive: Option<u16>,
}

impl StaticPeerConfig {
    /// Build the record served for this peer.
    pub fn to_record(&self) -> Result<PeerRecord, String> {
        let public_key: PeerId = self.public_key.parse().map_err(|e| format!("{}", e))?;

        let endpoint = match &self.endpoint {
            Some(raw) => Some(
                raw.parse::<SocketAddr>()
                    .map_err(|e| format!("endpoint {:?}: {}", raw, e))?,
            ),
            None => None,
        };

        let allowed_ips = self
            .allowed_ips
            .iter()
            .map(|raw| {
                raw.parse::<IpNet>()
                    .map_err(|e| format!("allowed ip {:?}: {}", raw, e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PeerRecord {
            public_key,
            endpoint,
            allowed_ips,
            persistent_keepalive: self.persistent_keepalive,
            protocol_version: 1,
            ..Default::default()
        })
    }
}
