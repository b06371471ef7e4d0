//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Route registration:
//!     auth strategy name → ApiServer strategy table → AuthScheme
//!
//! Incoming request:
//!     → RequestGuard (routing/guard.rs) calls AuthScheme::authenticate
//!     → 401 on failure, validation and handler otherwise
//! ```
//!
//! # Design Decisions
//! - Fail closed: an unknown strategy is a startup error, not an open route
//! - Schemes only see headers; they never read the body

pub mod auth;

pub use auth::{AuthScheme, BearerToken};
