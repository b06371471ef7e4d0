//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (global tracing subscriber, JSON or pretty)
//!     → access_log.rs (one `request` event per response)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (log aggregation)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through all log events of a request
//! - Metrics are cheap (atomic increments)

pub mod access_log;
pub mod logging;
pub mod metrics;

pub use logging::{LogError, LogFormat, LogService, LogSettings};
