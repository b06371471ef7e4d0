//! HTTP server setup and route table.
//!
//! # Responsibilities
//! - Own the route table routers register into
//! - Reject invalid paths and conflicting routes at registration time
//! - Hold the named auth strategies routes resolve against
//! - Wire up middleware (request ID, tracing, access log, timeout, panics)
//! - Bind the app to a listener and serve until shutdown
//!
//! # Design Decisions
//! - Routes are collected first and turned into an axum `Router` once, so
//!   several routers may share a path with disjoint methods
//! - Registration errors are values; axum never gets a route it would panic on
//! - Per-route body limits are layered on the route, not globally

use std::any::Any;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{Request, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, on, MethodFilter, MethodRouter},
    Router,
};
use futures_util::future::BoxFuture;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::HttpConfig;
use crate::http::error::ApiError;
use crate::observability::access_log::access_log_middleware;
use crate::routing::definition::Methods;
use crate::routing::options::RouteOptions;
use crate::security::auth::AuthScheme;

/// Type-erased request handler stored in the route table.
pub type RouteHandler = Arc<dyn Fn(Request<Body>) -> BoxFuture<'static, Response> + Send + Sync>;

/// A fully resolved route, ready to be served.
pub struct RouteRegistration {
    pub router: String,
    pub path: String,
    pub methods: Methods,
    pub options: RouteOptions,
    pub handler: RouteHandler,
}

/// Route table entry, without the handler.
#[derive(Debug, Clone)]
pub struct RouteInfo {
    pub router: String,
    pub path: String,
    pub methods: Methods,
    pub options: RouteOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("Invalid path '{path}' in router '{router}': {reason}")]
    InvalidPath {
        router: String,
        path: String,
        reason: String,
    },

    #[error("Route {methods} {path} of router '{router}' conflicts with {existing_path} of router '{existing}'")]
    Conflict {
        router: String,
        path: String,
        methods: String,
        existing: String,
        existing_path: String,
    },

    #[error("Unsupported HTTP method '{method}' for {path}")]
    UnsupportedMethod { method: String, path: String },
}

/// HTTP server the routers register into.
pub struct ApiServer {
    config: HttpConfig,
    auth: BTreeMap<String, Arc<dyn AuthScheme>>,
    routes: BTreeMap<String, Vec<MethodRouter>>,
    table: Vec<RouteInfo>,
}

impl ApiServer {
    pub fn new(config: HttpConfig) -> Self {
        Self {
            config,
            auth: BTreeMap::new(),
            routes: BTreeMap::new(),
            table: Vec::new(),
        }
    }

    /// Register a named auth strategy. A later registration replaces it.
    pub fn auth_strategy(&mut self, name: impl Into<String>, scheme: Arc<dyn AuthScheme>) {
        self.auth.insert(name.into(), scheme);
    }

    pub fn auth_scheme(&self, name: &str) -> Option<Arc<dyn AuthScheme>> {
        self.auth.get(name).cloned()
    }

    /// Body cap injected into routes that accept a payload.
    pub fn max_payload_bytes(&self) -> usize {
        self.config.max_payload_bytes
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Registered routes, in registration order.
    pub fn table(&self) -> &[RouteInfo] {
        &self.table
    }

    /// Add a route to the table.
    pub fn route(&mut self, registration: RouteRegistration) -> Result<(), RegistrationError> {
        validate_path(&registration.router, &registration.path)?;

        let shape = path_shape(&registration.path);
        let conflict = self.table.iter().find(|existing| {
            path_shape(&existing.path) == shape
                && (existing.path != registration.path
                    || existing.methods.overlaps(&registration.methods))
        });
        if let Some(existing) = conflict {
            return Err(RegistrationError::Conflict {
                router: registration.router,
                path: registration.path,
                methods: registration.methods.to_string(),
                existing: existing.router.clone(),
                existing_path: existing.path.clone(),
            });
        }

        let method_router = method_router(&registration)?;

        tracing::debug!(
            router = %registration.router,
            methods = %registration.methods,
            path = %registration.path,
            "Route registered"
        );

        self.routes
            .entry(registration.path.clone())
            .or_default()
            .push(method_router);
        self.table.push(RouteInfo {
            router: registration.router,
            path: registration.path,
            methods: registration.methods,
            options: registration.options,
        });
        Ok(())
    }

    /// Build the axum app with all middleware layers.
    #[allow(deprecated)]
    pub fn app(&self) -> Router {
        let mut router = Router::new();
        for (path, method_routers) in &self.routes {
            if let Some(merged) = method_routers.iter().cloned().reduce(|a, b| a.merge(b)) {
                router = router.route(path, merged);
            }
        }

        router
            .fallback(not_found)
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.request_timeout_secs,
            )))
            .layer(middleware::from_fn(access_log_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn start(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let address = listener.local_addr()?;
        let app = self
            .app()
            .into_make_service_with_connect_info::<SocketAddr>();

        tracing::info!(address = %address, routes = self.table.len(), "Server running");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn method_router(registration: &RouteRegistration) -> Result<MethodRouter, RegistrationError> {
    let handler = registration.handler.clone();
    let service = move |request: Request<Body>| handler(request);

    let mut router = match &registration.methods {
        Methods::Any => any(service),
        Methods::List(methods) => {
            let mut filter: Option<MethodFilter> = None;
            for method in methods {
                let next = MethodFilter::try_from(method.clone()).map_err(|_| {
                    RegistrationError::UnsupportedMethod {
                        method: method.to_string(),
                        path: registration.path.clone(),
                    }
                })?;
                filter = Some(match filter {
                    Some(current) => current.or(next),
                    None => next,
                });
            }
            let filter = filter.ok_or_else(|| RegistrationError::UnsupportedMethod {
                method: String::new(),
                path: registration.path.clone(),
            })?;
            on(filter, service)
        }
    };

    if let Some(max_bytes) = registration.options.payload.as_ref().and_then(|p| p.max_bytes) {
        router = router.layer(DefaultBodyLimit::max(max_bytes));
    }
    Ok(router)
}

/// Check a path against the syntax the route table accepts:
/// static segments, `{name}` params and a final `{*name}` wildcard.
fn validate_path(router: &str, path: &str) -> Result<(), RegistrationError> {
    let invalid = |reason: &str| RegistrationError::InvalidPath {
        router: router.to_string(),
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let Some(rest) = path.strip_prefix('/') else {
        return Err(invalid("must start with '/'"));
    };

    let segments: Vec<&str> = rest.split('/').collect();
    let last = segments.len() - 1;
    for (index, segment) in segments.iter().enumerate() {
        if segment.starts_with(':') {
            return Err(invalid("use '{name}' instead of ':name' for parameters"));
        }
        if segment.starts_with('*') {
            return Err(invalid("use '{*name}' instead of '*name' for wildcards"));
        }
        if !segment.contains(['{', '}']) {
            continue;
        }
        let Some(inner) = segment
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
        else {
            return Err(invalid("a parameter must span its whole segment"));
        };
        let (name, wildcard) = match inner.strip_prefix('*') {
            Some(name) => (name, true),
            None => (inner, false),
        };
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid("parameter names must be non-empty identifiers"));
        }
        if wildcard && index != last {
            return Err(invalid("a wildcard must be the last segment"));
        }
    }
    Ok(())
}

/// Path with parameter names erased; equal shapes match the same requests.
fn path_shape(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.starts_with("{*") {
                "{*}"
            } else if segment.starts_with('{') {
                "{}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

async fn not_found(uri: Uri) -> Response {
    ApiError::not_found(format!("Route {} not found", uri.path())).into_response()
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Handler panicked");
    ApiError::internal().into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    fn text_handler(text: &'static str) -> RouteHandler {
        Arc::new(move |_: Request<Body>| -> BoxFuture<'static, Response> {
            Box::pin(async move { text.into_response() })
        })
    }

    fn registration(router: &str, methods: impl Into<Methods>, path: &str) -> RouteRegistration {
        RouteRegistration {
            router: router.into(),
            path: path.into(),
            methods: methods.into(),
            options: RouteOptions::default(),
            handler: text_handler("ok"),
        }
    }

    fn server() -> ApiServer {
        ApiServer::new(HttpConfig::default())
    }

    async fn call(app: Router, method: Method, uri: &str) -> Response {
        app.oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("r", "/").is_ok());
        assert!(validate_path("r", "/api/widgets/{id}").is_ok());
        assert!(validate_path("r", "/files/{*rest}").is_ok());
        assert!(validate_path("r", "api").is_err());
        assert!(validate_path("r", "/api/:id").is_err());
        assert!(validate_path("r", "/files/{*rest}/x").is_err());
        assert!(validate_path("r", "/a/{id").is_err());
        assert!(validate_path("r", "/a/x{id}").is_err());
        assert!(validate_path("r", "/a/{}").is_err());
    }

    #[test]
    fn test_path_shape_ignores_names() {
        assert_eq!(path_shape("/a/{id}"), path_shape("/a/{name}"));
        assert_ne!(path_shape("/a/{id}"), path_shape("/a/{*id}"));
        assert_ne!(path_shape("/a/b"), path_shape("/a/{b}"));
    }

    #[test]
    fn test_conflicts_are_errors() {
        let mut server = server();
        server.route(registration("A", Method::GET, "/x")).unwrap();
        server.route(registration("B", Method::POST, "/x")).unwrap();

        let err = server
            .route(registration("C", Methods::Any, "/x"))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Conflict { ref existing, .. } if existing == "A"));

        server.route(registration("A", Method::GET, "/items/{id}")).unwrap();
        assert!(server
            .route(registration("B", Method::DELETE, "/items/{name}"))
            .is_err());
        assert_eq!(server.table().len(), 3);
    }

    #[tokio::test]
    async fn test_shared_path_disjoint_methods() {
        let mut server = server();
        server
            .route(RouteRegistration {
                handler: text_handler("get"),
                ..registration("A", Method::GET, "/x")
            })
            .unwrap();
        server
            .route(RouteRegistration {
                handler: text_handler("post"),
                ..registration("B", Method::POST, "/x")
            })
            .unwrap();

        let app = server.app();
        let get = call(app.clone(), Method::GET, "/x").await;
        let body = axum::body::to_bytes(get.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"get");

        let post = call(app.clone(), Method::POST, "/x").await;
        let body = axum::body::to_bytes(post.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"post");

        let put = call(app, Method::PUT, "/x").await;
        assert_eq!(put.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404_with_request_id() {
        let response = call(server().app(), Method::GET, "/missing").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_panic_becomes_500() {
        let mut server = server();
        async fn panics(_: Request<Body>) -> Response {
            panic!("boom")
        }
        let handler: RouteHandler =
            Arc::new(|request: Request<Body>| -> BoxFuture<'static, Response> {
                Box::pin(panics(request))
            });
        server
            .route(RouteRegistration {
                handler,
                ..registration("A", Method::GET, "/panic")
            })
            .unwrap();

        let response = call(server.app(), Method::GET, "/panic").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unsupported_method() {
        let custom = Method::from_bytes(b"PURGE").unwrap();
        let err = server()
            .route(registration("A", custom, "/x"))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::UnsupportedMethod { .. }));
    }
}
