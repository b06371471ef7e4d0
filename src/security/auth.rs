//! Named authentication strategies.
//!
//! Routes refer to a strategy by name (`auth("internal")`, `restricted()`);
//! the server holds the name → scheme table and resolves it once, when the
//! route is registered.

use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::http::error::ApiError;

/// Checks the credentials carried by a request.
pub trait AuthScheme: Send + Sync {
    /// `Err` is sent to the client as is (normally 401).
    fn authenticate(&self, headers: &HeaderMap) -> Result<(), ApiError>;
}

/// `Authorization: Bearer <token>` against a single shared token.
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl AuthScheme for BearerToken {
    fn authenticate(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let presented = headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        match presented {
            Some(token) if !self.token.is_empty() && constant_time_eq(token, &self.token) => Ok(()),
            Some(_) => Err(ApiError::unauthorized("Invalid credentials")),
            None => Err(ApiError::unauthorized("Missing authentication")),
        }
    }
}

/// Compares every byte regardless of where the first mismatch is.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_bearer_token() {
        let scheme = BearerToken::new("s3cret");
        assert!(scheme.authenticate(&headers("Bearer s3cret")).is_ok());

        let wrong = scheme.authenticate(&headers("Bearer nope")).unwrap_err();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.message(), "Invalid credentials");

        let missing = scheme.authenticate(&HeaderMap::new()).unwrap_err();
        assert_eq!(missing.message(), "Missing authentication");

        assert!(scheme.authenticate(&headers("Basic s3cret")).is_err());
    }

    #[test]
    fn test_token_comparison() {
        assert!(constant_time_eq("s3cret", "s3cret"));
        assert!(!constant_time_eq("s3cret", "s3creT"));
        assert!(!constant_time_eq("s3cret", "s3cret2"));

        let scheme = BearerToken::new("s3cret");
        assert!(scheme.authenticate(&headers("Bearer s3cre")).is_err());
        assert!(scheme.authenticate(&headers("Bearer s3cretX")).is_err());
    }

    #[test]
    fn test_empty_token_never_matches() {
        let scheme = BearerToken::new("");
        assert!(scheme.authenticate(&headers("Bearer ")).is_err());
    }
}
