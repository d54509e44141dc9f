//! Peer lookup subsystem.
//!
//! # Data Flow
//! ```text
//! POST /find (list of public keys)
//!     → service.rs (LookupService::find)
//!     → device.rs (DeviceControl: wg dump or static tables)
//!     → types.rs (LookupResponse, one record per requested key)
//! ```
//!
//! # Design Decisions
//! - Unknown keys are answered in-band with an empty record
//! - Device failures are surfaced unchanged to the caller
//! - No caching: every lookup reads the current peer table

pub mod device;
pub mod service;
pub mod types;

pub use device::{DeviceControl, DeviceError, StaticDevices, WgCommand};
pub use service::LookupService;
pub use types::{InvalidPeerId, LookupRequest, LookupResponse, PeerId, PeerRecord, PeerTable};
