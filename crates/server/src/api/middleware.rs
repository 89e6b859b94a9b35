//! Ingress authentication and metrics middleware for API routes.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::metrics::{
    normalize_path, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION,
    INGRESS_AUTH_FAILURES,
};
use crate::state::AppState;

/// Metrics middleware that tracks HTTP request duration and counts.
///
/// This middleware records:
/// - Request duration (histogram)
/// - Request count (counter)
/// - Requests in flight (gauge)
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Rejects calls that do not present the configured ingress key.
///
/// The key is accepted as `Authorization: Bearer <key>` or `X-API-Key: <key>`.
/// With no key configured every call passes.
pub async fn ingress_auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.ingress_api_key() else {
        return Ok(next.run(request).await);
    };

    let Some(provided) = extract_key(request.headers()) else {
        INGRESS_AUTH_FAILURES
            .with_label_values(&["missing_key"])
            .inc();
        return Err(StatusCode::UNAUTHORIZED);
    };

    if !keys_match(provided, expected) {
        warn!(path = %request.uri().path(), "Rejected webhook call with invalid key");
        INGRESS_AUTH_FAILURES
            .with_label_values(&["invalid_key"])
            .inc();
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

fn extract_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(key) = value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))
        {
            return Some(key);
        }
    }

    headers.get("x-api-key").and_then(|v| v.to_str().ok())
}

/// Compares digests so the comparison does not depend on where the keys differ.
fn keys_match(provided: &str, expected: &str) -> bool {
    let a = Sha256::digest(provided.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
