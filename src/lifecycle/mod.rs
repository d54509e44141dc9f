//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Resolve addresses → Build lookup router → One listener per address
//!
//! Run (group.rs):
//!     Spawn every listener → Fan-in outcomes → First failure closes the group
//!
//! Stop (group.rs, signals.rs):
//!     SIGTERM/SIGINT → Graceful shutdown with deadline
//!     Second signal  → Close immediately
//!
//! Reporting (observer.rs):
//!     Every per-listener outcome → LifecycleObserver (tracing by default)
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then resolution, then listeners
//! - The listener set is fixed for the lifetime of the group
//! - Shutdown has timeout: forced close after deadline

pub mod group;
pub mod observer;
pub mod signals;
pub mod startup;

pub use group::ListenerGroup;
pub use observer::{LifecycleEvent, LifecycleObserver, Phase, TracingObserver};
