//! WireGuard peer lookup service.
//!
//! Answers "where are these peers?" for one WireGuard device, on every
//! configured address at once.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod lookup;
pub mod net;
pub mod observability;

pub use config::schema::ServiceConfig;
pub use lifecycle::ListenerGroup;
pub use lookup::LookupService;
