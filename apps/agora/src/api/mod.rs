//! # Agora HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health`, `GET /status`
//! - `GET|POST /users`, `POST /users/update`
//! - `GET|POST /posts`, `DELETE /posts/{id}`
//! - `POST /posts/{id}/{like|unlike|report|unreport|bookmark|unbookmark|comment|vote}`
//! - `POST /posts/{id}/comments/{commentId}/{like|unlike|reply}`
//! - `GET /notifications?username=`, `DELETE /notifications`, `DELETE /notifications/{id}`
//! - `GET /friends?username=`, `POST /friend-request`, `POST /friend-request/accept`
//! - `POST /follow`, `POST /unfollow`
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `AGORA_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `AGORA_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `AGORA_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod error;
mod handlers;
mod middleware;
mod types;

pub use auth::{api_key_from_env, key_matches};
pub use error::{ApiError, status_of};
pub use middleware::{DEFAULT_RATE_LIMIT, rate_limit_from_env, rate_limiter};
pub use types::{
    AckResponse, ActionRequest, ClearNotificationsResponse, CreatePostRequest, ErrorResponse,
    FollowBody, FriendRequestBody, FriendsResponse, HealthResponse, MediaPayload,
    NotificationsResponse, PostResponse, PostView, PostsResponse, StatusResponse,
    UpdateProfileRequest, UpsertUserResponse, UserResponse, UsernameBody, UsernameQuery,
    UsersResponse,
};

use agora_core::{AgoraError, Coordinator};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body. Media travels base64-encoded, so this
/// leaves room for a 10 MiB image.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}

impl AppState {
    #[must_use]
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const ALLOWED_METHODS: [Method; 4] = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

/// Build CORS layer from `AGORA_CORS_ORIGINS`:
/// - "*": allows all origins
/// - unset: localhost only
/// - otherwise: comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("AGORA_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (AGORA_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in AGORA_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods(ALLOWED_METHODS)
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => {
            tracing::info!("CORS: No AGORA_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:5173",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:5173",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(ALLOWED_METHODS)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate Limiting (if enabled)
/// 5. Authentication (if configured)
pub fn create_router(state: AppState) -> Router {
    let rate_limit = rate_limit_from_env();
    let limiter = rate_limiter(rate_limit);
    if limiter.is_some() {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
    } else {
        tracing::info!("Rate limiting disabled");
    }

    let api_key = api_key_from_env();
    if api_key.is_some() {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set AGORA_API_KEY environment variable to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route(
            "/users",
            get(handlers::list_users_handler).post(handlers::upsert_user_handler),
        )
        .route("/users/update", post(handlers::update_profile_handler))
        .route(
            "/posts",
            get(handlers::list_posts_handler).post(handlers::create_post_handler),
        )
        .route("/posts/{id}", delete(handlers::delete_post_handler))
        .route("/posts/{id}/{action}", post(handlers::post_action_handler))
        .route(
            "/posts/{id}/comments/{comment_id}/{action}",
            post(handlers::comment_action_handler),
        )
        .route(
            "/notifications",
            get(handlers::notifications_handler).delete(handlers::clear_notifications_handler),
        )
        .route(
            "/notifications/{id}",
            delete(handlers::delete_notification_handler),
        )
        .route("/friends", get(handlers::friends_handler))
        .route("/friend-request", post(handlers::friend_request_handler))
        .route(
            "/friend-request/accept",
            post(handlers::accept_friend_request_handler),
        )
        .route("/follow", post(handlers::follow_handler))
        .route("/unfollow", post(handlers::unfollow_handler));

    // Authentication runs innermost
    if let Some(key) = api_key {
        router = router.layer(axum_middleware::from_fn_with_state(
            auth::ApiKey::from(key),
            auth::require_api_key,
        ));
    }

    if let Some(limiter) = limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::throttle,
        ));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer())
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and run until Ctrl+C.
pub async fn run_server(addr: &str, coordinator: Coordinator) -> Result<(), AgoraError> {
    let router = create_router(AppState::new(coordinator));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AgoraError::Internal(format!("Bind failed: {}", e)))?;

    tracing::info!("Agora HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AgoraError::Internal(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
