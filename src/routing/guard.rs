//! Per-route request checks run before the handler: authentication, then
//! validation of headers, params, query and payload.

use std::sync::Arc;

use axum::http::HeaderMap;
use serde_json::{json, Map, Value};

use crate::http::error::ApiError;
use crate::http::request::RouteRequest;
use crate::routing::options::{AuthMode, RequestPart, RouteOptions, Validation};
use crate::security::auth::AuthScheme;

#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("Unknown authentication strategy '{0}'")]
    UnknownAuthStrategy(String),

    #[error("Invalid {part} validation schema: {message}")]
    InvalidSchema { part: RequestPart, message: String },
}

enum PartRule {
    Any,
    Empty,
    Schema(jsonschema::Validator),
}

/// Compiled checks for one route.
pub struct RequestGuard {
    auth: Option<(String, Arc<dyn AuthScheme>)>,
    rules: Vec<(RequestPart, PartRule)>,
}

impl RequestGuard {
    /// Compile the route's validation schemas and resolve its auth strategy.
    /// `schemes` resolves a strategy name to a registered scheme.
    pub fn compile<F>(options: &RouteOptions, schemes: F) -> Result<Self, GuardError>
    where
        F: Fn(&str) -> Option<Arc<dyn AuthScheme>>,
    {
        let auth = match &options.auth {
            Some(AuthMode::Strategy(name)) => {
                let scheme =
                    schemes(name).ok_or_else(|| GuardError::UnknownAuthStrategy(name.clone()))?;
                Some((name.clone(), scheme))
            }
            Some(AuthMode::Disabled) | None => None,
        };

        let mut rules = Vec::new();
        for part in RequestPart::ALL {
            let Some(validation) = options.validate.get(part) else {
                continue;
            };
            let rule = match validation {
                Validation::Toggle(true) => PartRule::Any,
                Validation::Toggle(false) => PartRule::Empty,
                Validation::Schema(schema) => {
                    let schema = Value::Object(schema.clone());
                    let validator = jsonschema::validator_for(&schema).map_err(|e| {
                        GuardError::InvalidSchema {
                            part,
                            message: e.to_string(),
                        }
                    })?;
                    PartRule::Schema(validator)
                }
            };
            rules.push((part, rule));
        }

        Ok(Self { auth, rules })
    }

    /// Authentication, then validation.
    pub fn check(&self, request: &RouteRequest) -> Result<(), ApiError> {
        self.authenticate(request.headers(), request.path())?;
        self.validate(request)
    }

    /// Run the route's auth strategy against the request headers. Needs no
    /// body, so it runs before the payload is read.
    pub fn authenticate(&self, headers: &HeaderMap, path: &str) -> Result<(), ApiError> {
        if let Some((name, scheme)) = &self.auth {
            scheme.authenticate(headers).map_err(|err| {
                tracing::debug!(strategy = %name, path = %path, "Authentication failed");
                err
            })?;
        }
        Ok(())
    }

    pub fn validate(&self, request: &RouteRequest) -> Result<(), ApiError> {
        for (part, rule) in &self.rules {
            match rule {
                PartRule::Any => {}
                PartRule::Empty => {
                    if !part_is_empty(request, *part) {
                        return Err(ApiError::bad_request(format!(
                            "Invalid request {} input",
                            part
                        ))
                        .with_data(json!({"errors": [format!("{} is not allowed", part)]})));
                    }
                }
                PartRule::Schema(validator) => {
                    let instance = part_instance(request, *part)?;
                    let errors: Vec<String> = validator
                        .iter_errors(&instance)
                        .map(|e| e.to_string())
                        .collect();
                    if !errors.is_empty() {
                        return Err(ApiError::bad_request(format!(
                            "Invalid request {} input",
                            part
                        ))
                        .with_data(json!({ "errors": errors })));
                    }
                }
            }
        }

        Ok(())
    }
}

fn part_is_empty(request: &RouteRequest, part: RequestPart) -> bool {
    match part {
        RequestPart::Query => request.query_params().is_empty(),
        RequestPart::Params => request.params().is_empty(),
        RequestPart::Headers => request.headers().is_empty(),
        RequestPart::Payload => request.payload().is_empty(),
    }
}

fn part_instance(request: &RouteRequest, part: RequestPart) -> Result<Value, ApiError> {
    let strings = |pairs: &mut dyn Iterator<Item = (String, String)>| {
        Value::Object(pairs.map(|(k, v)| (k, Value::String(v))).collect::<Map<_, _>>())
    };

    Ok(match part {
        RequestPart::Query => strings(
            &mut request
                .query_params()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        ),
        RequestPart::Params => strings(
            &mut request
                .params()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        ),
        RequestPart::Headers => strings(&mut request.headers().iter().filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })),
        RequestPart::Payload => {
            if request.payload().is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(request.payload()).map_err(|_| {
                    ApiError::bad_request("Invalid request payload JSON format")
                })?
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::definition::Methods;
    use crate::routing::options::RouteSettings;
    use crate::security::auth::BearerToken;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};

    fn settings() -> Arc<RouteSettings> {
        Arc::new(RouteSettings {
            router: "Test".into(),
            path: "/".into(),
            methods: Methods::Any,
            options: RouteOptions::default(),
        })
    }

    async fn request(builder: axum::http::request::Builder, body: &'static str) -> RouteRequest {
        RouteRequest::extract(builder.body(Body::from(body)).unwrap(), settings())
            .await
            .unwrap()
    }

    fn no_schemes(_: &str) -> Option<Arc<dyn AuthScheme>> {
        None
    }

    #[tokio::test]
    async fn test_payload_schema() {
        let options = RouteOptions::new().with_validation(
            RequestPart::Payload,
            json!({"type": "object", "required": ["name"]}),
        );
        let guard = RequestGuard::compile(&options, no_schemes).unwrap();

        let ok = request(Request::builder().method(Method::POST).uri("/"), r#"{"name": "a"}"#).await;
        assert!(guard.check(&ok).is_ok());

        let missing = request(Request::builder().method(Method::POST).uri("/"), r#"{"other": 1}"#).await;
        let err = guard.check(&missing).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Invalid request payload input");

        let garbage = request(Request::builder().method(Method::POST).uri("/"), "{not json").await;
        assert_eq!(
            guard.check(&garbage).unwrap_err().message(),
            "Invalid request payload JSON format"
        );
    }

    #[tokio::test]
    async fn test_query_toggle_false_requires_empty() {
        let options = RouteOptions::new().with_validation(RequestPart::Query, false);
        let guard = RequestGuard::compile(&options, no_schemes).unwrap();

        assert!(guard.check(&request(Request::builder().uri("/"), "").await).is_ok());
        assert!(guard.check(&request(Request::builder().uri("/?a=1"), "").await).is_err());
    }

    #[tokio::test]
    async fn test_query_schema_sees_strings() {
        let options = RouteOptions::new().with_validation(
            RequestPart::Query,
            json!({"properties": {"page": {"type": "string", "pattern": "^[0-9]+$"}}}),
        );
        let guard = RequestGuard::compile(&options, no_schemes).unwrap();

        assert!(guard.check(&request(Request::builder().uri("/?page=2"), "").await).is_ok());
        assert!(guard.check(&request(Request::builder().uri("/?page=two"), "").await).is_err());
    }

    #[test]
    fn test_invalid_schema_fails_compile() {
        let options = RouteOptions::new()
            .with_validation(RequestPart::Headers, json!({"type": "not-a-type"}));
        assert!(matches!(
            RequestGuard::compile(&options, no_schemes),
            Err(GuardError::InvalidSchema { part: RequestPart::Headers, .. })
        ));
    }

    #[test]
    fn test_unknown_strategy_fails_compile() {
        let options = RouteOptions::new().with_auth(AuthMode::Strategy("internal".into()));
        assert!(matches!(
            RequestGuard::compile(&options, no_schemes),
            Err(GuardError::UnknownAuthStrategy(name)) if name == "internal"
        ));
    }

    #[tokio::test]
    async fn test_auth_runs_before_validation() {
        let options = RouteOptions::new()
            .with_auth(AuthMode::Strategy("internal".into()))
            .with_validation(RequestPart::Query, false);
        let scheme: Arc<dyn AuthScheme> = Arc::new(BearerToken::new("s3cret"));
        let guard = RequestGuard::compile(&options, |_| Some(scheme.clone())).unwrap();

        let anonymous = request(Request::builder().uri("/?a=1"), "").await;
        assert_eq!(guard.check(&anonymous).unwrap_err().status(), StatusCode::UNAUTHORIZED);

        let authorized = request(
            Request::builder().uri("/").header("authorization", "Bearer s3cret"),
            "",
        )
        .await;
        assert!(guard.check(&authorized).is_ok());
    }
}
