//! apito: HTTP API bootstrap.
//!
//! Controllers declare their routes with builder calls, routers turn those
//! declarations into guarded axum routes, and `lifecycle::startup` wires the
//! configuration, logging and database services together before serving.

// Core subsystems
pub mod config;
pub mod http;
pub mod routing;

// Services
pub mod database;
pub mod observability;
pub mod security;

// Application
pub mod lifecycle;
pub mod routers;

pub use config::{AppConfig, ConfigService, EnvVars};
pub use database::DatabaseService;
pub use http::{ApiError, ApiServer, Reply, ResponseToolkit, RouteRequest};
pub use lifecycle::Shutdown;
pub use routing::{handle, Controller, ControllerRouter, Router, RouterDefinition};
