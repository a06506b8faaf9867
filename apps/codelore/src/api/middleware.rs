//! # Rate Limiting Middleware
//!
//! Global (not per-client) token bucket via `governor`. The limit comes
//! from `CODELORE_RATE_LIMIT` (requests per second, 0 disables).

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Shared global limiter handle.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const DEFAULT_REQUESTS_PER_SECOND: u32 = 100;

/// Build a limiter for the given requests-per-second budget.
#[must_use]
pub fn create_rate_limiter(requests_per_second: u32) -> GlobalRateLimiter {
    let rps = NonZeroU32::new(requests_per_second)
        .or(NonZeroU32::new(DEFAULT_REQUESTS_PER_SECOND))
        .unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_second(rps)))
}

/// Read `CODELORE_RATE_LIMIT`; unset means the default, 0 disables.
#[must_use]
pub fn get_rate_limit_from_env() -> u32 {
    std::env::var("CODELORE_RATE_LIMIT")
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_REQUESTS_PER_SECOND)
}

/// Shed load with 429 once the bucket is drained.
pub async fn rate_limit_middleware(
    State(limiter): State<GlobalRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if limiter.check().is_err() {
        tracing::warn!(path = %request.uri().path(), "request rate limited");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }
    Ok(next.run(request).await)
}
