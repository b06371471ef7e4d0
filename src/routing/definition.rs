//! Route declarations.
//!
//! A controller lists its routes as values: each `RouteDefinition` carries a
//! handler, its method set and path, and the options accumulated from every
//! declaration applied to it. Declarations merge in the order they are
//! applied, so option declarations may come before or after the method/path
//! declaration.
//!
//! ```ignore
//! impl Controller for Widgets {
//!     fn define() -> Result<RouterDefinition<Self>, DefinitionError> {
//!         RouterDefinition::new()
//!             .prefix("/api")
//!             .route(handle(Widgets::list).get("/widgets"))?
//!             .route(handle(Widgets::create).payload(json!({"required": ["name"]})).post("/widgets"))
//!     }
//! }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::http::Method;
use futures_util::future::BoxFuture;
use serde_json::{Map, Value};

use crate::http::request::RouteRequest;
use crate::http::response::{Reply, ResponseToolkit};
use crate::routing::options::{
    AuthMode, PayloadOptions, RequestPart, RouteOptions, Validation, INTERNAL_STRATEGY,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("Route #{position} of router '{router}': handler's method and path are required")]
    MissingMethodOrPath { router: String, position: usize },

    #[error("Unknown HTTP method '{0}'")]
    InvalidMethod(String),
}

/// HTTP methods a route answers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Methods {
    /// Wildcard (`*`).
    Any,
    List(Vec<Method>),
}

impl Methods {
    /// Parse `*`, a single method, or a comma-separated list.
    pub fn parse(value: &str) -> Result<Self, DefinitionError> {
        let value = value.trim();
        if value == "*" {
            return Ok(Methods::Any);
        }
        let methods = value
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                    .map_err(|_| DefinitionError::InvalidMethod(m.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Methods::List(methods))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Methods::List(methods) if methods.is_empty())
    }

    /// Whether requests may carry a body: anything but pure GET/HEAD.
    pub fn accepts_payload(&self) -> bool {
        match self {
            Methods::Any => true,
            Methods::List(methods) => methods
                .iter()
                .any(|m| *m != Method::GET && *m != Method::HEAD),
        }
    }

    pub fn overlaps(&self, other: &Methods) -> bool {
        match (self, other) {
            (Methods::Any, _) | (_, Methods::Any) => true,
            (Methods::List(a), Methods::List(b)) => a.iter().any(|m| b.contains(m)),
        }
    }
}

impl From<Method> for Methods {
    fn from(method: Method) -> Self {
        Methods::List(vec![method])
    }
}

impl From<Vec<Method>> for Methods {
    fn from(methods: Vec<Method>) -> Self {
        Methods::List(methods)
    }
}

impl fmt::Display for Methods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Methods::Any => f.write_str("*"),
            Methods::List(methods) => {
                let names: Vec<&str> = methods.iter().map(Method::as_str).collect();
                f.write_str(&names.join(","))
            }
        }
    }
}

pub type HandlerFuture = BoxFuture<'static, anyhow::Result<Reply>>;

/// Type-erased controller method.
pub type Handler<C> =
    Arc<dyn Fn(Arc<C>, RouteRequest, ResponseToolkit) -> HandlerFuture + Send + Sync>;

/// Start a route declaration for a controller method.
pub fn handle<C, F, Fut, R>(handler: F) -> RouteDefinition<C>
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, RouteRequest, ResponseToolkit) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    R: Into<Reply>,
{
    let handler: Handler<C> = Arc::new(
        move |controller: Arc<C>, request: RouteRequest, toolkit: ResponseToolkit| -> HandlerFuture {
            let future = handler(controller, request, toolkit);
            Box::pin(async move { future.await.map(Into::into) })
        },
    );
    RouteDefinition {
        handler,
        methods: None,
        path: None,
        options: RouteOptions::default(),
    }
}

/// One handler plus everything declared about it.
pub struct RouteDefinition<C> {
    handler: Handler<C>,
    methods: Option<Methods>,
    path: Option<String>,
    options: RouteOptions,
}

impl<C> RouteDefinition<C> {
    /// Route-defining declaration.
    pub fn route(self, methods: impl Into<Methods>, path: impl Into<String>) -> Self {
        self.route_with(methods, path, RouteOptions::default())
    }

    /// Route-defining declaration with inline options.
    pub fn route_with(
        mut self,
        methods: impl Into<Methods>,
        path: impl Into<String>,
        options: RouteOptions,
    ) -> Self {
        self.methods = Some(methods.into());
        self.path = Some(path.into());
        self.config(options)
    }

    pub fn get(self, path: impl Into<String>) -> Self {
        self.route(Method::GET, path)
    }

    pub fn post(self, path: impl Into<String>) -> Self {
        self.route(Method::POST, path)
    }

    pub fn put(self, path: impl Into<String>) -> Self {
        self.route(Method::PUT, path)
    }

    pub fn patch(self, path: impl Into<String>) -> Self {
        self.route(Method::PATCH, path)
    }

    pub fn delete(self, path: impl Into<String>) -> Self {
        self.route(Method::DELETE, path)
    }

    pub fn options(self, path: impl Into<String>) -> Self {
        self.route(Method::OPTIONS, path)
    }

    pub fn head(self, path: impl Into<String>) -> Self {
        self.route(Method::HEAD, path)
    }

    /// Every method (`*`).
    pub fn all(self, path: impl Into<String>) -> Self {
        self.route(Methods::Any, path)
    }

    /// Merge arbitrary options into this route.
    pub fn config(mut self, options: RouteOptions) -> Self {
        self.options = std::mem::take(&mut self.options).merge(options);
        self
    }

    pub fn validate(self, part: RequestPart, validation: impl Into<Validation>) -> Self {
        self.config(RouteOptions::new().with_validation(part, validation))
    }

    pub fn query(self, validation: impl Into<Validation>) -> Self {
        self.validate(RequestPart::Query, validation)
    }

    pub fn payload(self, validation: impl Into<Validation>) -> Self {
        self.validate(RequestPart::Payload, validation)
    }

    pub fn params(self, validation: impl Into<Validation>) -> Self {
        self.validate(RequestPart::Params, validation)
    }

    pub fn headers(self, validation: impl Into<Validation>) -> Self {
        self.validate(RequestPart::Headers, validation)
    }

    /// Body size cap for this route.
    pub fn max_bytes(self, max_bytes: usize) -> Self {
        self.config(RouteOptions::new().with_payload(PayloadOptions::max_bytes(max_bytes)))
    }

    /// Merge options for a named plugin.
    pub fn plugin(self, name: impl Into<String>, options: Map<String, Value>) -> Self {
        self.config(RouteOptions::new().with_plugin(name, options))
    }

    pub fn auth(self, strategy: impl Into<String>) -> Self {
        self.config(RouteOptions::new().with_auth(AuthMode::Strategy(strategy.into())))
    }

    /// Public route, no authentication.
    pub fn exposed(self) -> Self {
        self.config(RouteOptions::new().with_auth(AuthMode::Disabled))
    }

    /// Requires the `internal` strategy.
    pub fn restricted(self) -> Self {
        self.auth(INTERNAL_STRATEGY)
    }

    pub fn describe(self, description: impl Into<String>) -> Self {
        self.config(RouteOptions::new().with_description(description))
    }

    pub fn tags<I, T>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.config(RouteOptions::new().with_tags(tags))
    }

    pub fn methods(&self) -> Option<&Methods> {
        self.methods.as_ref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn route_options(&self) -> &RouteOptions {
        &self.options
    }

    pub(crate) fn handler(&self) -> Handler<C> {
        self.handler.clone()
    }

    fn is_defined(&self) -> bool {
        let has_methods = self.methods.as_ref().is_some_and(|m| !m.is_empty());
        let has_path = self.path.as_deref().is_some_and(|p| !p.is_empty());
        has_methods && has_path
    }
}

impl<C> fmt::Debug for RouteDefinition<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("methods", &self.methods)
            .field("path", &self.path)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// A controller's name, prefix and ordered routes.
pub struct RouterDefinition<C> {
    name: String,
    prefix: String,
    routes: Vec<RouteDefinition<C>>,
}

impl<C> RouterDefinition<C> {
    /// Name defaults to the controller's type name; prefix defaults to none.
    pub fn new() -> Self {
        Self {
            name: short_type_name::<C>().to_string(),
            prefix: String::new(),
            routes: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Path prefix for every relative route. A trailing `/` is dropped.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = prefix.trim_end_matches('/').to_string();
        self
    }

    /// Append a route. Fails if its method set or path was never declared.
    pub fn route(mut self, route: RouteDefinition<C>) -> Result<Self, DefinitionError> {
        if !route.is_defined() {
            return Err(DefinitionError::MissingMethodOrPath {
                router: self.name,
                position: self.routes.len(),
            });
        }
        self.routes.push(route);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.prefix
    }

    pub fn routes(&self) -> &[RouteDefinition<C>] {
        &self.routes
    }
}

impl<C> fmt::Debug for RouterDefinition<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterDefinition")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .field("routes", &self.routes)
            .finish()
    }
}

impl<C> Default for RouterDefinition<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// A type exposing routes.
pub trait Controller: Send + Sync + Sized + 'static {
    fn define() -> Result<RouterDefinition<Self>, DefinitionError>;
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
