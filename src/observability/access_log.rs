//! Per-request access logging.
//!
//! Emits one `request` event per response with the client address, method,
//! path, status and elapsed time, and feeds the request metrics.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::observability::metrics;

/// Header carrying the original client address behind a proxy.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Middleware function logging every completed request.
pub async fn access_log_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let address = client_address(request.headers(), peer);

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    tracing::info!(
        address = %address,
        method = %method,
        path = %path,
        status,
        time = elapsed_ms,
        "request"
    );
    metrics::record_request(&method, status, start);

    response
}

/// First `x-forwarded-for` entry, else the peer address.
pub fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_first_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        let peer = "127.0.0.1:4000".parse().ok();
        assert_eq!(client_address(&headers, peer), "203.0.113.7");
    }

    #[test]
    fn test_falls_back_to_peer() {
        let peer = "192.0.2.10:5555".parse().ok();
        assert_eq!(client_address(&HeaderMap::new(), peer), "192.0.2.10");
        assert_eq!(client_address(&HeaderMap::new(), None), "unknown");
    }
}
