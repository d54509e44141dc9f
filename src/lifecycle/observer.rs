//! Per-listener lifecycle reporting.
//!
//! The group hands every individual listener outcome to an observer
//! before it aggregates anything, so a failure hidden by the aggregate
//! is still visible here.

use std::fmt;
use std::net::SocketAddr;

use crate::net::ListenerError;

/// Which group operation produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Serve,
    Close,
    Shutdown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Serve => "serve",
            Phase::Close => "close",
            Phase::Shutdown => "shutdown",
        })
    }
}

/// Outcome of one listener in one operation.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleEvent<'a> {
    pub phase: Phase,
    pub index: usize,
    pub addr: SocketAddr,
    pub outcome: Result<(), &'a ListenerError>,
}

/// Receives every per-listener outcome.
pub trait LifecycleObserver: Send + Sync {
    fn record(&self, event: LifecycleEvent<'_>);
}

/// Default observer: structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl LifecycleObserver for TracingObserver {
    fn record(&self, event: LifecycleEvent<'_>) {
        match (event.phase, event.outcome) {
            (Phase::Serve, Ok(())) => tracing::info!(
                index = event.index,
                address = %event.addr,
                "Listener stopped"
            ),
            (phase, Ok(())) => tracing::debug!(
                index = event.index,
                address = %event.addr,
                %phase,
                "Listener stop completed"
            ),
            (phase, Err(error)) => tracing::error!(
                index = event.index,
                address = %event.addr,
                %phase,
                %error,
                "Listener error"
            ),
        }
    }
}
