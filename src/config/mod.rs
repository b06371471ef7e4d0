//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! <dir>/default.<ext>          (optional base)
//!     → deep merge <dir>/<NODE_ENV>.<ext>   (required overlay)
//!     → SECTION__KEY environment overrides
//!     → AppConfig (typed) + raw document (dotted lookups)
//!     → validation.rs (semantic checks)
//!     → ConfigService, shared via Arc
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod env;
pub mod loader;
pub mod schema;
pub mod service;
pub mod validation;

pub use env::EnvVars;
pub use loader::ConfigError;
pub use schema::{AppConfig, AuthConfig, DatabaseConfig, HttpConfig, LogConfig, ObservabilityConfig, PoolConfig};
pub use service::{ConfigService, RuntimeInfo};
