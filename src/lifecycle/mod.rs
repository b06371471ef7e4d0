//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     config → logger → database → panic hook (crash.rs) → metrics
//!     → server + routers → bind → serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → stop accepting → drain connections → close pool → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then services, then routers, listener last
//! - Fail fast: any startup error exits with code 1
//! - Handler panics answer 500 and the process keeps running

pub mod crash;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{build_server, run, StartupError};
