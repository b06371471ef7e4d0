//! Route options and their merge rules.
//!
//! # Design Decisions
//! - Typed fields instead of a free-form options object
//! - `merge` is applied once per declaration, in declaration order
//! - Later values win; tables (validation schemas, plugin options) merge
//!   key by key instead of being replaced

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::routing::definition::Methods;

/// Auth strategy used by `restricted()`.
pub const INTERNAL_STRATEGY: &str = "internal";

/// Request part a validation rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequestPart {
    Query,
    Payload,
    Params,
    Headers,
}

impl RequestPart {
    pub const ALL: [RequestPart; 4] = [
        RequestPart::Headers,
        RequestPart::Params,
        RequestPart::Query,
        RequestPart::Payload,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RequestPart::Query => "query",
            RequestPart::Payload => "payload",
            RequestPart::Params => "params",
            RequestPart::Headers => "headers",
        }
    }
}

impl fmt::Display for RequestPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation rule for one request part.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    /// `true` accepts anything, `false` requires the part to be empty.
    Toggle(bool),
    /// JSON Schema the part must satisfy.
    Schema(Map<String, Value>),
}

impl Validation {
    /// Build a rule from a JSON value. Booleans become toggles, objects become
    /// schemas, and any other value must be matched exactly.
    pub fn schema(value: Value) -> Self {
        match value {
            Value::Bool(enabled) => Validation::Toggle(enabled),
            Value::Object(schema) => Validation::Schema(schema),
            other => {
                let mut schema = Map::new();
                schema.insert("const".to_string(), other);
                Validation::Schema(schema)
            }
        }
    }

    /// Schemas merge key by key; a toggle replaces what was there.
    pub fn merge(self, next: Validation) -> Validation {
        match (self, next) {
            (Validation::Schema(mut current), Validation::Schema(next)) => {
                current.extend(next);
                Validation::Schema(current)
            }
            (_, next) => next,
        }
    }
}

impl From<bool> for Validation {
    fn from(enabled: bool) -> Self {
        Validation::Toggle(enabled)
    }
}

impl From<Value> for Validation {
    fn from(value: Value) -> Self {
        Validation::schema(value)
    }
}

/// Validation rules per request part.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidateOptions {
    rules: BTreeMap<RequestPart, Validation>,
}

impl ValidateOptions {
    pub fn get(&self, part: RequestPart) -> Option<&Validation> {
        self.rules.get(&part)
    }

    pub fn set(&mut self, part: RequestPart, validation: Validation) {
        let merged = match self.rules.remove(&part) {
            Some(current) => current.merge(validation),
            None => validation,
        };
        self.rules.insert(part, merged);
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RequestPart, &Validation)> {
        self.rules.iter().map(|(part, rule)| (*part, rule))
    }

    pub fn merge(mut self, next: ValidateOptions) -> ValidateOptions {
        for (part, rule) in next.rules {
            self.set(part, rule);
        }
        self
    }
}

/// Authentication requirement of a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// No authentication, even if the server gains a default strategy.
    Disabled,
    /// Named strategy registered on the server.
    Strategy(String),
}

/// Request body settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadOptions {
    /// Maximum accepted body size in bytes.
    pub max_bytes: Option<usize>,
}

impl PayloadOptions {
    pub fn max_bytes(max_bytes: usize) -> Self {
        Self {
            max_bytes: Some(max_bytes),
        }
    }

    fn merge(self, next: PayloadOptions) -> PayloadOptions {
        PayloadOptions {
            max_bytes: next.max_bytes.or(self.max_bytes),
        }
    }
}

/// Everything a route declares besides its method, path and handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteOptions {
    pub validate: ValidateOptions,
    pub auth: Option<AuthMode>,
    pub payload: Option<PayloadOptions>,
    pub plugins: BTreeMap<String, Map<String, Value>>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl RouteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validation(mut self, part: RequestPart, validation: impl Into<Validation>) -> Self {
        self.validate.set(part, validation.into());
        self
    }

    pub fn with_auth(mut self, auth: AuthMode) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_payload(mut self, payload: PayloadOptions) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Merge `options` into the named plugin's table.
    pub fn with_plugin(mut self, name: impl Into<String>, options: Map<String, Value>) -> Self {
        self.plugins.entry(name.into()).or_default().extend(options);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Options of the named plugin, if any were declared.
    pub fn plugin(&self, name: &str) -> Option<&Map<String, Value>> {
        self.plugins.get(name)
    }

    /// Apply `next` on top of `self`; values in `next` win.
    pub fn merge(self, next: RouteOptions) -> RouteOptions {
        let mut plugins = self.plugins;
        for (name, options) in next.plugins {
            plugins.entry(name).or_default().extend(options);
        }

        let payload = match (self.payload, next.payload) {
            (Some(current), Some(next)) => Some(current.merge(next)),
            (current, next) => next.or(current),
        };

        RouteOptions {
            validate: self.validate.merge(next.validate),
            auth: next.auth.or(self.auth),
            payload,
            plugins,
            description: next.description.or(self.description),
            tags: next.tags.or(self.tags),
        }
    }
}

/// Resolved settings of a registered route, visible to its handler.
#[derive(Debug, Clone)]
pub struct RouteSettings {
    pub router: String,
    pub path: String,
    pub methods: Methods,
    pub options: RouteOptions,
}
