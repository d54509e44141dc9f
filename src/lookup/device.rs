//! Device-control collaborators.
//!
//! # Responsibilities
//! - Fetch the current peer table of a named WireGuard device
//! - Report a missing or unusable device as [`DeviceError`]
//!
//! # Design Decisions
//! - Queries are synchronous and read-only; callers on async code paths
//!   move them to the blocking pool
//! - Implementations must tolerate unlimited concurrent callers

use std::path::PathBuf;
use std::process::Command;

use dashmap::DashMap;
use ipnet::IpNet;
use thiserror::Error;

use crate::lookup::types::{PeerId, PeerRecord, PeerTable};

/// Errors raised while querying a device.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device does not exist.
    #[error("device {device:?} not found")]
    NotFound { device: String },

    /// The device exists but could not be queried (for example it is not
    /// a WireGuard interface, or permission was denied).
    #[error("query of device {device:?} failed: {message}")]
    Query { device: String, message: String },

    /// The query tool itself could not be executed.
    #[error("device control unavailable: {source}")]
    Unavailable {
        #[source]
        source: std::io::Error,
    },

    /// The query produced output that could not be understood.
    #[error("unexpected output for device {device:?} at line {line}: {reason}")]
    Malformed {
        device: String,
        line: usize,
        reason: String,
    },
}

/// Source of peer tables, keyed by device name.
pub trait DeviceControl: Send + Sync {
    fn device(&self, name: &str) -> Result<PeerTable, DeviceError>;
}

/// Queries devices through the `wg` userspace tool.
#[derive(Debug, Clone)]
pub struct WgCommand {
    binary: PathBuf,
}

impl WgCommand {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for WgCommand {
    fn default() -> Self {
        Self::new("wg")
    }
}

impl DeviceControl for WgCommand {
    fn device(&self, name: &str) -> Result<PeerTable, DeviceError> {
        let output = Command::new(&self.binary)
            .args(["show", name, "dump"])
            .output()
            .map_err(|source| DeviceError::Unavailable { source })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.contains("No such device") {
                return Err(DeviceError::NotFound {
                    device: name.to_string(),
                });
            }
            return Err(DeviceError::Query {
                device: name.to_string(),
                message: stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_dump(name, &stdout)
    }
}

/// Parse the output of `wg show <device> dump`.
///
/// The first line describes the interface itself; every following line
/// is one peer with eight tab-separated fields.
pub fn parse_dump(device: &str, dump: &str) -> Result<PeerTable, DeviceError> {
    let malformed = |line: usize, reason: String| DeviceError::Malformed {
        device: device.to_string(),
        line,
        reason,
    };

    let mut peers = PeerTable::new();
    for (idx, line) in dump.lines().enumerate().skip(1) {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 8 {
            return Err(malformed(
                line_no,
                format!("expected 8 fields, got {}", fields.len()),
            ));
        }

        let public_key: PeerId = fields[0]
            .parse()
            .map_err(|e| malformed(line_no, format!("{}", e)))?;

        let endpoint = match fields[2] {
            "(none)" => None,
            raw => match raw.parse() {
                Ok(addr) => Some(addr),
                Err(_) => {
                    // Scoped IPv6 endpoints ("[fe80::1%eth0]:51820") have no SocketAddr form.
                    tracing::warn!(device, peer = %public_key, endpoint = raw, "Unparseable peer endpoint");
                    None
                }
            },
        };

        let allowed_ips = match fields[3] {
            "(none)" | "" => Vec::new(),
            raw => raw
                .split(',')
                .map(|net| net.trim().parse::<IpNet>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| malformed(line_no, format!("allowed ips: {}", e)))?,
        };

        let number = |field: &str, what: &str| -> Result<u64, DeviceError> {
            field
                .parse::<u64>()
                .map_err(|e| malformed(line_no, format!("{}: {}", what, e)))
        };

        let last_handshake = match number(fields[4], "latest handshake")? {
            0 => None,
            secs => Some(secs),
        };

        let persistent_keepalive = match fields[7] {
            "off" => None,
            raw => Some(
                raw.parse::<u16>()
                    .map_err(|e| malformed(line_no, format!("keepalive: {}", e)))?,
            ),
        };

        peers.insert(
            public_key,
            PeerRecord {
                public_key,
                endpoint,
                allowed_ips,
                last_handshake,
                rx_bytes: number(fields[5], "transfer rx")?,
                tx_bytes: number(fields[6], "transfer tx")?,
                persistent_keepalive,
                protocol_version: 1,
            },
        );
    }

    Ok(peers)
}

/// In-memory peer tables.
#[derive(Debug, Default)]
pub struct StaticDevices {
    devices: DashMap<String, PeerTable>,
}

impl StaticDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the peer table of `name`, creating the device if needed.
    pub fn set_device(&self, name: impl Into<String>, peers: impl IntoIterator<Item = PeerRecord>) {
        let table: PeerTable = peers.into_iter().map(|p| (p.public_key, p)).collect();
        self.devices.insert(name.into(), table);
    }

    pub fn remove_device(&self, name: &str) -> bool {
        self.devices.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl DeviceControl for StaticDevices {
    fn device(&self, name: &str) -> Result<PeerTable, DeviceError> {
        self.devices
            .get(name)
            .map(|table| table.value().clone())
            .ok_or_else(|| DeviceError::NotFound {
                device: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const K1: &str = "fjCs9/W9VrlzkdcuqaJgZFolrLIMDX3KtYmHoxMotl4=";
    const K2: &str = "c/o2wTr6r+vO8SHSWVCF840fMs1G1BBvOwtGbNLS2FM=";

    fn dump() -> String {
        [
            "cHJpdmF0ZWtleXByaXZhdGVrZXlwcml2YXRla2V5eHg=\tcHVibGlja2V5cHVibGlja2V5cHVibGlja2V5cHVibGk=\t60000\toff".to_string(),
            format!("{K1}\t(none)\t192.168.10.1:123\t10.0.0.2/32\t1700000000\t1024\t2048\t25"),
            format!("{K2}\t(none)\t(none)\t10.0.0.3/32,fd00::3/128\t0\t0\t0\toff"),
        ]
        .join("\n")
    }

    #[test]
    fn parses_wg_dump() {
        let table = parse_dump("wg0", &dump()).unwrap();
        assert_eq!(table.len(), 2);

        let p1 = &table[&K1.parse().unwrap()];
        assert_eq!(p1.endpoint, Some("192.168.10.1:123".parse().unwrap()));
        assert_eq!(p1.last_handshake, Some(1_700_000_000));
        assert_eq!(p1.rx_bytes, 1024);
        assert_eq!(p1.tx_bytes, 2048);
        assert_eq!(p1.persistent_keepalive, Some(25));
        assert_eq!(p1.protocol_version, 1);

        let p2 = &table[&K2.parse().unwrap()];
        assert!(p2.endpoint.is_none());
        assert!(p2.last_handshake.is_none());
        assert!(p2.persistent_keepalive.is_none());
        assert_eq!(p2.allowed_ips.len(), 2);
    }

    #[test]
    fn interface_only_dump_is_empty() {
        let only_interface = dump().lines().next().unwrap().to_string();
        assert!(parse_dump("wg0", &only_interface).unwrap().is_empty());
    }

    #[test]
    fn rejects_short_lines() {
        let bad = format!("iface line\n{K1}\t(none)\t(none)");
        match parse_dump("wg0", &bad) {
            Err(DeviceError::Malformed { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected malformed error, got {:?}", other),
        }
    }

    #[test]
    fn static_devices_lookup() {
        let devices = StaticDevices::new();
        let id: PeerId = K1.parse().unwrap();
        devices.set_device(
            "wg0",
            [PeerRecord {
                public_key: id,
                ..Default::default()
            }],
        );

        assert_eq!(devices.device("wg0").unwrap().len(), 1);
        assert!(matches!(
            devices.device("wg1"),
            Err(DeviceError::NotFound { device }) if device == "wg1"
        ));

        assert!(devices.remove_device("wg0"));
        assert!(devices.is_empty());
    }

    #[test]
    fn missing_wg_binary_is_unavailable() {
        let wg = WgCommand::new("/nonexistent/wg-share-test-binary");
        assert!(matches!(
            wg.device("wg0"),
            Err(DeviceError::Unavailable { .. })
        ));
    }
}
