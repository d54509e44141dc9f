//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI overrides
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → resolve.rs (device name / address list → socket addresses)
//!     → lifecycle::startup builds the listener group
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the listener set never changes at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Resolution failures are fatal before any listener starts

pub mod loader;
pub mod resolve;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::*;
pub use validation::{validate_config, ValidationError};
