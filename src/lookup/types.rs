//! Peer identifiers and records exchanged by the lookup service.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ipnet::IpNet;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Length of a WireGuard public key in bytes.
pub const KEY_LEN: usize = 32;

/// Error returned when a peer identifier cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid peer id {input:?}: expected base64 encoding of {KEY_LEN} bytes")]
pub struct InvalidPeerId {
    pub input: String,
}

/// A peer's public key.
///
/// Always rendered as standard base64, which is also its wire form,
/// so it can key JSON objects directly.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId([u8; KEY_LEN]);

impl PeerId {
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&STANDARD.encode(self.0))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self)
    }
}

impl FromStr for PeerId {
    type Err = InvalidPeerId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidPeerId { input: s.to_string() };
        let decoded = STANDARD.decode(s.trim()).map_err(|_| invalid())?;
        let bytes: [u8; KEY_LEN] = decoded.try_into().map_err(|_| invalid())?;
        Ok(Self(bytes))
    }
}

impl Serialize for PeerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PeerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Everything the device reports about one peer.
///
/// The `Default` value is the empty record handed out for identifiers
/// the device does not know.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerRecord {
    pub public_key: PeerId,
    pub endpoint: Option<SocketAddr>,
    pub allowed_ips: Vec<IpNet>,
    /// Unix seconds of the latest handshake, `None` if there never was one.
    pub last_handshake: Option<u64>,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    /// Keepalive interval in seconds, `None` when disabled.
    pub persistent_keepalive: Option<u16>,
    pub protocol_version: u32,
}

/// Current peer table of a single device.
pub type PeerTable = HashMap<PeerId, PeerRecord>;

/// Identifiers to look up. Duplicates are allowed.
pub type LookupRequest = Vec<PeerId>;

/// Result of a lookup: exactly one entry per requested identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResponse {
    pub peers: HashMap<PeerId, PeerRecord>,
}
