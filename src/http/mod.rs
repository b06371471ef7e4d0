//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum app, middleware, route table)
//!     → request.rs (params, query, headers, body under the route limit)
//!     → [routing guard + controller handler]
//!     → response.rs (Reply or toolkit response)
//!     → error.rs (ApiError / masked 500 as JSON)
//!     → Send to client
//! ```

pub mod error;
pub mod request;
pub mod response;
pub mod server;

pub use error::ApiError;
pub use request::{RouteRequest, X_REQUEST_ID};
pub use response::{Reply, ResponseToolkit};
pub use server::{ApiServer, RegistrationError, RouteInfo, RouteRegistration};
