//! Controller routers.
//!
//! # Responsibilities
//! - Read a controller's route declarations once, at construction
//! - Resolve final paths and merged options for every route
//! - Inject the default payload cap into routes that accept a body
//! - Wrap each handler: extract, guard, call, turn the outcome into a response
//! - Register everything with the server, in declaration order
//!
//! # Design Decisions
//! - Initialization is all-or-nothing from the caller's point of view: the
//!   first error is returned and startup halts
//! - `ApiError` reaches the client unchanged; every other error is masked
//! - A toolkit reply always wins over the handler's return value

use std::sync::Arc;

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;

use crate::http::error::ApiError;
use crate::http::request::RouteRequest;
use crate::http::response::ResponseToolkit;
use crate::http::server::{ApiServer, RegistrationError, RouteHandler, RouteRegistration};
use crate::routing::definition::{Controller, DefinitionError, Handler, RouterDefinition};
use crate::routing::guard::{GuardError, RequestGuard};
use crate::routing::options::{PayloadOptions, RouteOptions, RouteSettings};

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("Route {path} of router '{router}': {source}")]
    Guard {
        router: String,
        path: String,
        #[source]
        source: GuardError,
    },
}

/// Something that registers routes on the server.
pub trait Router: Send + Sync {
    fn name(&self) -> &str;

    /// Path prefix of the router's relative routes.
    fn path(&self) -> &str;

    /// Register every route. `route_config` is merged under each route's own
    /// options.
    fn initialize(
        &self,
        server: &mut ApiServer,
        route_config: Option<&RouteOptions>,
    ) -> Result<(), RouterError>;
}

/// Router backed by a `Controller`'s declarations.
pub struct ControllerRouter<C: Controller> {
    controller: Arc<C>,
    definition: RouterDefinition<C>,
}

impl<C: Controller> ControllerRouter<C> {
    pub fn new(controller: Arc<C>) -> Result<Self, DefinitionError> {
        Ok(Self {
            controller,
            definition: C::define()?,
        })
    }

    pub fn controller(&self) -> &Arc<C> {
        &self.controller
    }
}

impl<C: Controller> Router for ControllerRouter<C> {
    fn name(&self) -> &str {
        self.definition.name()
    }

    fn path(&self) -> &str {
        self.definition.path()
    }

    fn initialize(
        &self,
        server: &mut ApiServer,
        route_config: Option<&RouteOptions>,
    ) -> Result<(), RouterError> {
        for (position, route) in self.definition.routes().iter().enumerate() {
            let (Some(methods), Some(declared_path)) = (route.methods(), route.path()) else {
                return Err(DefinitionError::MissingMethodOrPath {
                    router: self.name().to_string(),
                    position,
                }
                .into());
            };

            let path = resolve_path(self.path(), declared_path);
            let mut options = route_config
                .cloned()
                .unwrap_or_default()
                .merge(route.route_options().clone());

            let has_limit = options.payload.as_ref().and_then(|p| p.max_bytes).is_some();
            if methods.accepts_payload() && !has_limit {
                options = options.merge(
                    RouteOptions::new()
                        .with_payload(PayloadOptions::max_bytes(server.max_payload_bytes())),
                );
            }

            tracing::trace!(
                router = %self.name(),
                methods = %methods,
                path = %path,
                "initializing route"
            );

            let guard = RequestGuard::compile(&options, |name| server.auth_scheme(name))
                .map_err(|source| RouterError::Guard {
                    router: self.name().to_string(),
                    path: path.clone(),
                    source,
                })?;

            let settings = Arc::new(RouteSettings {
                router: self.name().to_string(),
                path: path.clone(),
                methods: methods.clone(),
                options: options.clone(),
            });

            server.route(RouteRegistration {
                router: self.name().to_string(),
                path,
                methods: methods.clone(),
                options,
                handler: dispatch(
                    self.controller.clone(),
                    route.handler(),
                    Arc::new(guard),
                    settings,
                ),
            })?;
        }
        Ok(())
    }
}

/// Final path of a route: `~` makes it absolute, otherwise it hangs off the
/// prefix. Always one leading `/`, never a trailing one (except the root).
pub fn resolve_path(prefix: &str, path: &str) -> String {
    let path = path.trim_end_matches('/');
    let joined = match path.strip_prefix('~') {
        Some(absolute) => absolute.to_string(),
        None => {
            let prefix = prefix.trim_end_matches('/');
            if path.is_empty() {
                prefix.to_string()
            } else if path.starts_with('/') {
                format!("{prefix}{path}")
            } else {
                format!("{prefix}/{path}")
            }
        }
    };
    format!("/{}", joined.trim_start_matches('/'))
}

fn dispatch<C>(
    controller: Arc<C>,
    handler: Handler<C>,
    guard: Arc<RequestGuard>,
    settings: Arc<RouteSettings>,
) -> RouteHandler
where
    C: Send + Sync + 'static,
{
    Arc::new(move |request: Request<Body>| -> BoxFuture<'static, Response> {
        let controller = controller.clone();
        let handler = handler.clone();
        let guard = guard.clone();
        let settings = settings.clone();

        Box::pin(async move {
            if let Err(err) = guard.authenticate(request.headers(), request.uri().path()) {
                return err.into_response();
            }
            let request = match RouteRequest::extract(request, settings.clone()).await {
                Ok(request) => request,
                Err(err) => return err.into_response(),
            };
            if let Err(err) = guard.validate(&request) {
                return err.into_response();
            }

            let toolkit = ResponseToolkit::new();
            let outcome = handler(controller, request, toolkit.clone()).await;
            let sent = toolkit.take();

            match outcome {
                Ok(reply) => sent.unwrap_or_else(|| reply.into_response()),
                Err(err) => {
                    tracing::error!(
                        router = %settings.router,
                        path = %settings.path,
                        error = %format!("{err:#}"),
                        "Route Error"
                    );
                    if let Some(response) = sent {
                        return response;
                    }
                    match err.downcast::<ApiError>() {
                        Ok(api_error) => api_error.into_response(),
                        Err(_) => ApiError::internal().into_response(),
                    }
                }
            }
        })
    })
}
