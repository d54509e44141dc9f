//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wg_share::config::ServiceConfig;
use wg_share::http::build_router;
use wg_share::lifecycle::{LifecycleEvent, LifecycleObserver, ListenerGroup, Phase};
use wg_share::lookup::{DeviceControl, DeviceError, LookupService, PeerId, PeerRecord, PeerTable, StaticDevices};
use wg_share::net::HttpListener;

pub const DEVICE: &str = "wgtest";

pub const KEYS: [&str; 3] = [
    "fjCs9/W9VrlzkdcuqaJgZFolrLIMDX3KtYmHoxMotl4=",
    "c/o2wTr6r+vO8SHSWVCF840fMs1G1BBvOwtGbNLS2FM=",
    "JcQV1mLx6XNg0H/61NJPcPSMpU4ghXYaydZKgf7qDQ4=",
];

/// A key no test device knows.
pub const UNKNOWN_KEY: &str = "yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk=";

pub fn key(raw: &str) -> PeerId {
    raw.parse().unwrap()
}

/// `DEVICE` with three peers, endpoints as in a typical site-to-site setup.
pub fn test_devices() -> Arc<StaticDevices> {
    let endpoints = ["192.168.10.1:123", "123.168.20.5:456", "89.43.12.33:789"];
    let devices = StaticDevices::new();
    devices.set_device(
        DEVICE,
        KEYS.iter().zip(endpoints).map(|(k, endpoint)| PeerRecord {
            public_key: key(k),
            endpoint: Some(endpoint.parse().unwrap()),
            protocol_version: 1,
            ..Default::default()
        }),
    );
    Arc::new(devices)
}

/// Device control that takes `delay` to answer.
pub struct SlowDevice {
    pub delay: Duration,
}

impl DeviceControl for SlowDevice {
    fn device(&self, _name: &str) -> Result<PeerTable, DeviceError> {
        std::thread::sleep(self.delay);
        Ok(PeerTable::new())
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub phase: Phase,
    pub index: usize,
    pub addr: SocketAddr,
    pub ok: bool,
}

/// Observer that keeps every event for assertions.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Recorded>>,
}

impl RecordingObserver {
    pub fn events(&self, phase: Phase) -> Vec<Recorded> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.phase == phase)
            .cloned()
            .collect()
    }
}

impl LifecycleObserver for RecordingObserver {
    fn record(&self, event: LifecycleEvent<'_>) {
        self.events.lock().unwrap().push(Recorded {
            phase: event.phase,
            index: event.index,
            addr: event.addr,
            ok: event.outcome.is_ok(),
        });
    }
}

/// Config listening on the given IPs with an ephemeral port.
pub fn loopback_config(addresses: &[&str]) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.device = DEVICE.to_string();
    config.listener.port = 0;
    config.listener.addresses = addresses.iter().map(|a| a.to_string()).collect();
    config
}

/// Group over explicit socket addresses, bypassing address resolution.
pub fn group_on(
    addrs: &[SocketAddr],
    control: Arc<dyn DeviceControl>,
    observer: Arc<dyn LifecycleObserver>,
) -> ListenerGroup<HttpListener> {
    let lookup = Arc::new(LookupService::new(DEVICE, control));
    let router = build_router(lookup, Duration::from_secs(10));
    let listeners = addrs
        .iter()
        .map(|addr| HttpListener::new(*addr, router.clone(), 64))
        .collect();
    ListenerGroup::with_observer(listeners, observer)
}

/// Wait until every listener of the group has bound.
pub async fn wait_until_bound(group: &ListenerGroup<HttpListener>) -> Vec<SocketAddr> {
    for _ in 0..100 {
        let bound: Vec<SocketAddr> = group
            .listeners()
            .iter()
            .filter_map(|l| l.local_addr())
            .collect();
        if bound.len() == group.len() {
            return bound;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("listeners did not bind in time");
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}
