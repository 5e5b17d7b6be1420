//! # Access Key Gate
//!
//! When `AGORA_API_KEY` is set, every route except `/health` answers 401
//! unless the caller presents that key. The key is sent in the
//! `Authorization` header, either bare or as `Bearer <key>`.
//!
//! The gate is deployment-wide. Usernames in request bodies are still taken
//! at face value once a request is through.

use super::types::ErrorResponse;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Key every gated request must present.
pub type ApiKey = Arc<str>;

/// Routes reachable without a key.
const OPEN_PATHS: &[&str] = &["/health"];

/// `AGORA_API_KEY`, or `None` when unset or blank.
pub fn api_key_from_env() -> Option<String> {
    std::env::var("AGORA_API_KEY")
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

/// The key carried by the `Authorization` header, without a `Bearer ` prefix.
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    Some(value.strip_prefix("Bearer ").unwrap_or(value).trim())
}

/// Constant-time key comparison.
///
/// Both sides are zero-padded to the longer length before `ct_eq`, and the
/// lengths are compared separately.
pub fn key_matches(presented: &str, expected: &str) -> bool {
    let width = presented.len().max(expected.len());
    let pad = |key: &str| {
        let mut bytes = key.as_bytes().to_vec();
        bytes.resize(width, 0);
        bytes
    };

    let same_bytes: bool = pad(presented).ct_eq(&pad(expected)).into();
    same_bytes && presented.len() == expected.len()
}

/// Layer installed by `create_router` when a key is configured.
pub async fn require_api_key(
    State(expected): State<ApiKey>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if OPEN_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    match presented_key(request.headers()) {
        Some(key) if key_matches(key, &expected) => next.run(request).await,
        Some(_) => {
            tracing::warn!(path = %request.uri().path(), "rejected request with wrong api key");
            unauthorized("Invalid API key")
        }
        None => {
            tracing::warn!(path = %request.uri().path(), "rejected request without api key");
            unauthorized("API key required")
        }
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new("unauthorized", message)),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(authorization: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(authorization).expect("header"),
        );
        map
    }

    #[test]
    fn bearer_prefix_is_optional() {
        assert_eq!(presented_key(&headers("Bearer k3y")), Some("k3y"));
        assert_eq!(presented_key(&headers("k3y")), Some("k3y"));
        assert_eq!(presented_key(&HeaderMap::new()), None);
    }

    #[test]
    fn only_the_exact_key_matches() {
        assert!(key_matches("agora-k3y", "agora-k3y"));
        assert!(!key_matches("agora", "agora-k3y"));
        assert!(!key_matches("agora-k3y-extra", "agora-k3y"));
        assert!(!key_matches("agora-k3z", "agora-k3y"));
        assert!(!key_matches("", "agora-k3y"));
    }
}
