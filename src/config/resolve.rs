//! Listener address resolution.
//!
//! Turns the configured device name or address list into the socket
//! addresses the listeners bind to. Every failure here happens before
//! any listener exists.

use std::net::{IpAddr, SocketAddr, SocketAddrV6};

use crate::config::loader::ConfigError;

/// All IP addresses assigned to the interface called `name`.
///
/// IPv6 link-local addresses come back with the interface's scope id,
/// since they cannot be bound without one.
pub fn interface_addrs(name: &str, port: u16) -> Result<Vec<SocketAddr>, ConfigError> {
    let iface = netdev::get_interfaces()
        .into_iter()
        .find(|iface| iface.name == name)
        .ok_or_else(|| ConfigError::UnknownInterface {
            name: name.to_string(),
        })?;

    let mut addrs: Vec<SocketAddr> = iface
        .ipv4
        .iter()
        .map(|net| SocketAddr::new(IpAddr::V4(net.addr()), port))
        .collect();

    for net in &iface.ipv6 {
        let ip = net.addr();
        // fe80::/10
        let link_local = ip.segments()[0] & 0xffc0 == 0xfe80;
        let scope_id = if link_local { iface.index } else { 0 };
        addrs.push(SocketAddr::V6(SocketAddrV6::new(ip, port, 0, scope_id)));
    }

    tracing::debug!(interface = name, count = addrs.len(), "Resolved interface addresses");
    Ok(addrs)
}

/// Parse one plain IP address, ignoring surrounding whitespace.
pub fn parse_ip(raw: &str) -> Result<IpAddr, ConfigError> {
    raw.trim()
        .parse::<IpAddr>()
        .map_err(|_| ConfigError::InvalidAddress(raw.to_string()))
}

/// Parse plain IP address strings. Networks and host names are rejected.
pub fn parse_ips<S: AsRef<str>>(addrs: &[S]) -> Result<Vec<IpAddr>, ConfigError> {
    addrs.iter().map(|raw| parse_ip(raw.as_ref())).collect()
}

/// Socket addresses for the listeners.
///
/// With an empty `addrs` the addresses of `device` are used; otherwise
/// `addrs` is parsed and the device is not consulted.
pub fn socket_addrs<S: AsRef<str>>(
    device: &str,
    port: u16,
    addrs: &[S],
) -> Result<Vec<SocketAddr>, ConfigError> {
    let resolved = if addrs.is_empty() {
        interface_addrs(device, port)?
    } else {
        parse_ips(addrs)?
            .into_iter()
            .map(|ip| SocketAddr::new(ip, port))
            .collect()
    };

    if resolved.is_empty() {
        return Err(ConfigError::NoAddresses {
            device: device.to_string(),
        });
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_and_multiple_addresses() {
        let ips = parse_ips(&["127.0.0.1"]).unwrap();
        assert_eq!(ips, vec!["127.0.0.1".parse::<IpAddr>().unwrap()]);

        let ips = parse_ips(&["127.0.0.1", "::1"]).unwrap();
        assert_eq!(ips.len(), 2);
        assert!(ips[1].is_ipv6());
    }

    #[test]
    fn rejects_subnets_and_garbage() {
        assert!(matches!(
            parse_ips(&["10.0.0.1/24"]),
            Err(ConfigError::InvalidAddress(a)) if a == "10.0.0.1/24"
        ));
        assert!(parse_ips(&["300.1.1.1"]).is_err());
        assert!(parse_ips(&["foo"]).is_err());
    }

    #[test]
    fn explicit_addresses_skip_the_device() {
        let addrs = socket_addrs("no-such-device", 9000, &["127.0.0.1", "::1"]).unwrap();
        assert_eq!(
            addrs,
            vec![
                "127.0.0.1:9000".parse::<SocketAddr>().unwrap(),
                "[::1]:9000".parse().unwrap()
            ]
        );
    }

    #[test]
    fn unknown_interface_fails() {
        let none: [&str; 0] = [];
        assert!(matches!(
            socket_addrs("wg-share-bogus0", 9000, &none),
            Err(ConfigError::UnknownInterface { .. })
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn loopback_interface_has_addresses() {
        let addrs = interface_addrs("lo", 9000).unwrap();
        assert!(addrs.iter().any(|a| a.ip().is_loopback()));
        assert!(addrs.iter().all(|a| a.port() == 9000));
    }
}
