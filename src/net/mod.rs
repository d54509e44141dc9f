//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Configured socket address
//!     → listener.rs (bind, accept loop, connection limits)
//!     → connection.rs (HTTP/1 + HTTP/2 per connection, drain handling)
//!     → Hand off to the HTTP router
//!
//! Listener phases:
//!     Idle → Serving → [Draining →] Stopped
//!     (Draining only while a graceful stop has connections left)
//! Stop requests:
//!     Close (abort connections) | Drain (finish in-flight, then stop)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Connections live in a per-listener task set so close can abort them all
//! - A requested stop is reported as success; only real failures are errors

pub mod connection;
pub mod listener;

pub use listener::{HttpListener, Listener, ListenerError};
