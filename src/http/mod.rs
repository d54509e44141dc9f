//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection (net layer)
//!     → server.rs (Axum router, request ID, timeout, trace)
//!     → POST /find → lookup::LookupService on the blocking pool
//!     → response.rs (device errors → status + JSON body)
//!     → Send to client
//! ```

pub mod response;
pub mod server;

pub use response::ErrorBody;
pub use server::{build_router, AppState, X_REQUEST_ID};
