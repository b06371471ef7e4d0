//! Routers shipped with the server.
//!
//! New routers implement `Controller` and are added to the list in
//! `lifecycle::startup::routers`.

pub mod index;

pub use index::{IndexRouter, VersionInfo, VERSION_LOOKUP_KEY};
