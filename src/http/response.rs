//! Handler return values and the response toolkit.
//!
//! # Responsibilities
//! - `Reply`: what a handler returns on success
//! - `ResponseToolkit`: lets a handler send its own response
//!
//! # Design Decisions
//! - A response sent through the toolkit wins over the returned value
//! - Only the first toolkit reply is kept
//! - Empty replies map to 204 No Content

use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

/// Successful handler result.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// No body (204).
    Empty,
    /// Plain text body.
    Text(String),
    /// JSON body.
    Json(Value),
}

impl Reply {
    /// Serialize any value into a JSON reply.
    pub fn json<T: Serialize>(value: &T) -> anyhow::Result<Self> {
        Ok(Reply::Json(serde_json::to_value(value)?))
    }
}

impl From<&str> for Reply {
    fn from(value: &str) -> Self {
        Reply::Text(value.to_string())
    }
}

impl From<String> for Reply {
    fn from(value: String) -> Self {
        Reply::Text(value)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Json(value)
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Empty
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Reply::Empty => StatusCode::NO_CONTENT.into_response(),
            Reply::Text(text) => text.into_response(),
            Reply::Json(value) => Json(value).into_response(),
        }
    }
}

/// Response channel handed to every handler invocation.
#[derive(Clone, Default)]
pub struct ResponseToolkit {
    sent: Arc<Mutex<Option<Response>>>,
}

impl ResponseToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send `response` now. Returns false if a response was already sent.
    pub fn reply(&self, response: impl IntoResponse) -> bool {
        let mut sent = self.lock();
        if sent.is_some() {
            return false;
        }
        *sent = Some(response.into_response());
        true
    }

    pub fn is_sent(&self) -> bool {
        self.lock().is_some()
    }

    pub(crate) fn take(&self) -> Option<Response> {
        self.lock().take()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Response>> {
        self.sent.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ResponseToolkit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseToolkit")
            .field("sent", &self.is_sent())
            .finish()
    }
}
