//! Startup orchestration.
//!
//! # Responsibilities
//! - Pick the device-control backend
//! - Resolve listener addresses
//! - Build the shared lookup handler and one listener per address
//!
//! # Design Decisions
//! - Fail fast: any resolution error is fatal before a listener exists
//! - One router instance is shared by every listener

use std::sync::Arc;
use std::time::Duration;

use crate::config::resolve::socket_addrs;
use crate::config::{ConfigError, DeviceBackend, ServiceConfig, ValidationError};
use crate::http::build_router;
use crate::lifecycle::group::ListenerGroup;
use crate::lifecycle::observer::{LifecycleObserver, TracingObserver};
use crate::lookup::{DeviceControl, LookupService, StaticDevices, WgCommand};
use crate::net::HttpListener;

/// Device-control backend selected by the configuration.
pub fn device_control(config: &ServiceConfig) -> Result<Arc<dyn DeviceControl>, ConfigError> {
    match config.backend {
        DeviceBackend::Wg => {
            tracing::info!(binary = %config.wg_binary, "Using wg device backend");
            Ok(Arc::new(WgCommand::new(&config.wg_binary)))
        }
        DeviceBackend::Static => {
            let devices = StaticDevices::new();
            for device in &config.devices {
                let peers = device
                    .peers
                    .iter()
                    .map(|peer| {
                        peer.to_record().map_err(|reason| {
                            ConfigError::Validation(vec![ValidationError::InvalidPeer {
                                device: device.name.clone(),
                                reason,
                            }])
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                devices.set_device(device.name.clone(), peers);
            }
            tracing::info!(devices = devices.len(), "Using static device backend");
            Ok(Arc::new(devices))
        }
    }
}

/// Build the listener group described by `config`.
pub fn configure(
    config: &ServiceConfig,
    control: Arc<dyn DeviceControl>,
) -> Result<ListenerGroup<HttpListener>, ConfigError> {
    configure_with_observer(config, control, Arc::new(TracingObserver))
}

pub fn configure_with_observer(
    config: &ServiceConfig,
    control: Arc<dyn DeviceControl>,
    observer: Arc<dyn LifecycleObserver>,
) -> Result<ListenerGroup<HttpListener>, ConfigError> {
    let addrs = socket_addrs(
        &config.device,
        config.listener.port,
        &config.listener.addresses,
    )?;

    let lookup = Arc::new(LookupService::new(config.device.clone(), control));
    let router = build_router(lookup, Duration::from_secs(config.timeouts.request_secs));

    let listeners: Vec<HttpListener> = addrs
        .iter()
        .map(|addr| HttpListener::new(*addr, router.clone(), config.listener.max_connections))
        .collect();

    tracing::info!(
        device = %config.device,
        addresses = ?addrs,
        max_connections = config.listener.max_connections,
        "Listeners configured"
    );

    Ok(ListenerGroup::with_observer(listeners, observer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StaticDeviceConfig, StaticPeerConfig};

    #[test]
    fn configures_one_listener_per_address() {
        let mut config = ServiceConfig::default();
        config.listener.port = 9100;
        config.listener.addresses = vec!["127.0.0.1".into(), "::1".into()];

        let group = configure(&config, Arc::new(StaticDevices::new())).unwrap();
        assert_eq!(group.len(), 2);
        assert_eq!(
            group.addresses(),
            vec!["127.0.0.1:9100".parse().unwrap(), "[::1]:9100".parse().unwrap()]
        );
    }

    #[test]
    fn bad_address_prevents_any_listener() {
        let mut config = ServiceConfig::default();
        config.listener.addresses = vec!["127.0.0.1".into(), "bogus".into()];

        assert!(matches!(
            configure(&config, Arc::new(StaticDevices::new())),
            Err(ConfigError::InvalidAddress(a)) if a == "bogus"
        ));
    }

    #[test]
    fn unknown_device_without_addresses_fails() {
        let mut config = ServiceConfig::default();
        config.device = "wg-share-bogus0".into();

        assert!(matches!(
            configure(&config, Arc::new(StaticDevices::new())),
            Err(ConfigError::UnknownInterface { .. })
        ));
    }

    #[test]
    fn static_backend_serves_configured_peers() {
        let mut config = ServiceConfig::default();
        config.backend = DeviceBackend::Static;
        config.devices.push(StaticDeviceConfig {
            name: "wg0".into(),
            peers: vec![StaticPeerConfig {
                public_key: "fjCs9/W9VrlzkdcuqaJgZFolrLIMDX3KtYmHoxMotl4=".into(),
                endpoint: Some("192.168.10.1:123".into()),
                allowed_ips: vec!["10.0.0.2/32".into()],
                persistent_keepalive: Some(25),
            }],
        });

        let control = device_control(&config).unwrap();
        let table = control.device("wg0").unwrap();
        assert_eq!(table.len(), 1);
        let record = table.values().next().unwrap();
        assert_eq!(record.endpoint, Some("192.168.10.1:123".parse().unwrap()));
        assert_eq!(record.persistent_keepalive, Some(25));
    }
}
