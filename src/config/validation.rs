//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, connection limits > 0)
//! - Detect duplicate listener addresses
//! - Check static peer tables before they reach the device layer
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::IpAddr;

use thiserror::Error;

use crate::config::resolve::parse_ip;
use crate::config::schema::{DeviceBackend, ServiceConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("device name must not be empty")]
    EmptyDevice,

    #[error("listener.max_connections must be greater than zero")]
    ZeroMaxConnections,

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("listener address {0:?} is not an IP address")]
    InvalidListenAddress(String),

    #[error("listener address {0} is listed more than once")]
    DuplicateListenAddress(IpAddr),

    #[error("static device {0:?} is defined more than once")]
    DuplicateDevice(String),

    #[error("static device {device:?}: {reason}")]
    InvalidPeer { device: String, reason: String },

    #[error("backend is static but device {0:?} has no [[devices]] entry")]
    MissingStaticDevice(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.device.trim().is_empty() {
        errors.push(ValidationError::EmptyDevice);
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    let mut seen = HashSet::new();
    for raw in &config.listener.addresses {
        match parse_ip(raw) {
            Ok(ip) => {
                if !seen.insert(ip) {
                    errors.push(ValidationError::DuplicateListenAddress(ip));
                }
            }
            Err(_) => errors.push(ValidationError::InvalidListenAddress(raw.clone())),
        }
    }

    let mut names = HashSet::new();
    for device in &config.devices {
        if !names.insert(device.name.as_str()) {
            errors.push(ValidationError::DuplicateDevice(device.name.clone()));
        }
        for peer in &device.peers {
            if let Err(reason) = peer.to_record() {
                errors.push(ValidationError::InvalidPeer {
                    device: device.name.clone(),
                    reason,
                });
            }
        }
    }

    if config.backend == DeviceBackend::Static && !names.contains(config.device.as_str()) {
        errors.push(ValidationError::MissingStaticDevice(config.device.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
