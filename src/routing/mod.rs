//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Controller::define() (definition.rs)
//!     → RouterDefinition: name, prefix, ordered RouteDefinitions
//!     → options.rs merges every declaration in application order
//!
//! Router initialization (router.rs, at startup):
//!     → resolve path (prefix / `~` absolute)
//!     → merge route config, inject payload cap
//!     → compile guard (guard.rs: auth + validation)
//!     → ApiServer::route()
//!
//! Request:
//!     → RouteRequest::extract → RequestGuard::check → handler
//!     → Reply / toolkit response / ApiError / masked 500
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Registration order equals declaration order
//! - Schemas and auth strategies resolve before the first request

pub mod definition;
pub mod guard;
pub mod options;
pub mod router;

pub use definition::{handle, Controller, DefinitionError, Methods, RouteDefinition, RouterDefinition};
pub use guard::{GuardError, RequestGuard};
pub use options::{AuthMode, PayloadOptions, RequestPart, RouteOptions, RouteSettings, Validation};
pub use router::{resolve_path, ControllerRouter, Router, RouterError};
