//! Request view handed to route handlers.
//!
//! # Responsibilities
//! - Buffer the body under the route's size limit
//! - Expose path params, query string and headers as plain maps
//! - Carry the request ID and the resolved route settings
//!
//! # Design Decisions
//! - Extraction failures become `ApiError`s with axum's own status codes
//!   (oversized bodies answer 413)
//! - Query and path values stay strings; typed access goes through serde

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{rejection::PathRejection, FromRequest, FromRequestParts, Path, Query},
    http::{HeaderMap, Method, Request, Uri},
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::http::error::ApiError;
use crate::routing::options::RouteSettings;

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

#[derive(Debug, Clone)]
pub struct RouteRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: BTreeMap<String, String>,
    query: BTreeMap<String, String>,
    payload: Bytes,
    request_id: Option<String>,
    settings: Arc<RouteSettings>,
}

impl RouteRequest {
    pub async fn extract(
        request: Request<Body>,
        settings: Arc<RouteSettings>,
    ) -> Result<Self, ApiError> {
        let (mut parts, body) = request.into_parts();

        let params = match Path::<HashMap<String, String>>::from_request_parts(&mut parts, &()).await
        {
            Ok(Path(params)) => params.into_iter().collect(),
            Err(PathRejection::MissingPathParams(_)) => BTreeMap::new(),
            Err(rejection) => return Err(ApiError::new(rejection.status(), rejection.body_text())),
        };

        let query = match Query::<BTreeMap<String, String>>::try_from_uri(&parts.uri) {
            Ok(Query(query)) => query,
            Err(rejection) => return Err(ApiError::new(rejection.status(), rejection.body_text())),
        };

        let method = parts.method.clone();
        let uri = parts.uri.clone();
        let headers = parts.headers.clone();
        let request_id = headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let payload = Bytes::from_request(Request::from_parts(parts, body), &())
            .await
            .map_err(|rejection| ApiError::new(rejection.status(), rejection.body_text()))?;

        Ok(Self {
            method,
            uri,
            headers,
            params,
            query,
            payload,
            request_id,
            settings,
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as text, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn query_params(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Raw request body. Empty when none was sent.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.payload)
            .map_err(|_| ApiError::bad_request("Invalid request payload JSON format"))
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Settings of the route that matched this request.
    pub fn settings(&self) -> &RouteSettings {
        &self.settings
    }

    /// Options declared for the named plugin on this route.
    pub fn plugin_options(&self, name: &str) -> Option<&Map<String, Value>> {
        self.settings.options.plugin(name)
    }
}
