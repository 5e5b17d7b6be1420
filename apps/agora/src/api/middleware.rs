//! # Request Throttling
//!
//! One governor bucket shared by all clients. `AGORA_RATE_LIMIT` sets the
//! refill rate in requests per second; 0 leaves the layer out entirely.

use super::types::ErrorResponse;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Requests per second when `AGORA_RATE_LIMIT` is unset or unreadable.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

/// Shared bucket for the whole router.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Bucket refilling at `per_second`; `None` for 0, which means unthrottled.
pub fn rate_limiter(per_second: u32) -> Option<GlobalRateLimiter> {
    let rate = NonZeroU32::new(per_second)?;
    Some(Arc::new(RateLimiter::direct(Quota::per_second(rate))))
}

/// Read `AGORA_RATE_LIMIT`.
pub fn rate_limit_from_env() -> u32 {
    parse_rate_limit(std::env::var("AGORA_RATE_LIMIT").ok().as_deref())
}

fn parse_rate_limit(raw: Option<&str>) -> u32 {
    raw.and_then(|value| value.trim().parse().ok())
        .unwrap_or(DEFAULT_RATE_LIMIT)
}

/// Layer answering 429 once the bucket is empty.
pub async fn throttle(
    State(limiter): State<GlobalRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if limiter.check().is_ok() {
        return next.run(request).await;
    }

    tracing::warn!(path = %request.uri().path(), "request throttled");
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(ErrorResponse::new("rate_limited", "Too many requests, slow down")),
    )
        .into_response()
}
