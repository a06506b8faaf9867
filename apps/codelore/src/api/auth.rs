//! # API Key Authentication
//!
//! Optional bearer-token auth keyed off `CODELORE_API_KEY`. When the
//! variable is unset the middleware is never installed and the API is
//! open. Key comparison is constant time over padded buffers so the
//! check leaks neither content nor length.

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

/// Longest key we compare; both sides are padded to this length.
const MAX_KEY_LENGTH: usize = 256;

/// Read the configured key, treating empty as unset.
#[must_use]
pub fn get_api_key_from_env() -> Option<String> {
    match std::env::var("CODELORE_API_KEY") {
        Ok(key) if !key.trim().is_empty() => Some(key),
        _ => None,
    }
}

/// Constant-time equality over padded copies plus a length check.
fn keys_match(provided: &str, expected: &str) -> bool {
    if provided.len() > MAX_KEY_LENGTH || expected.len() > MAX_KEY_LENGTH {
        return false;
    }

    let mut provided_buf = [0_u8; MAX_KEY_LENGTH];
    let mut expected_buf = [0_u8; MAX_KEY_LENGTH];
    provided_buf[..provided.len()].copy_from_slice(provided.as_bytes());
    expected_buf[..expected.len()].copy_from_slice(expected.as_bytes());

    let lengths_equal = provided.len().ct_eq(&expected.len());
    let contents_equal = provided_buf.ct_eq(&expected_buf);
    bool::from(lengths_equal & contents_equal)
}

/// Reject requests without a valid key. `/health` stays open for probes.
pub async fn api_key_auth_middleware(
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let Some(expected) = get_api_key_from_env() else {
        // Layer installed but key removed since startup; fail closed.
        tracing::warn!("auth middleware active without a configured key, rejecting");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v));

    match provided {
        Some(key) if keys_match(key, &expected) => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!(path = %request.uri().path(), "rejected request with invalid API key");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!(path = %request.uri().path(), "rejected request without API key");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
