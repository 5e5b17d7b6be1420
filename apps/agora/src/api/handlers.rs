//! # API Endpoint Handlers
//!
//! Handlers decode the request, run one coordinator call on the blocking
//! pool and wrap the result in its response envelope. Extractor rejections
//! are converted into `ApiError` so malformed input also gets an envelope.

use super::{
    AppState,
    error::ApiError,
    types::{
        AckResponse, ActionRequest, ClearNotificationsResponse, CreatePostRequest, FollowBody,
        FriendRequestBody, FriendsResponse, HealthResponse, NotificationsResponse, PostResponse,
        PostsResponse, StatusResponse, UpdateProfileRequest, UpsertUserResponse, UserResponse,
        UsernameBody, UsernameQuery, UsersResponse,
    },
};
use agora_core::{
    ActionResult, AgoraError, CommentId, Coordinator, NotificationId, PostId, Upsert, UserProfile,
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

type ApiResult<T> = Result<(StatusCode, Json<T>), ApiError>;

/// Run `job` against the coordinator on tokio's blocking pool.
async fn run<T, F>(state: &AppState, job: F) -> Result<T, ApiError>
where
    F: FnOnce(&Coordinator) -> Result<T, AgoraError> + Send + 'static,
    T: Send + 'static,
{
    let coordinator = Arc::clone(&state.coordinator);
    tokio::task::spawn_blocking(move || job(&coordinator))
        .await
        .map_err(|e| ApiError(AgoraError::Internal(format!("Worker task failed: {}", e))))?
        .map_err(ApiError::from)
}

fn ok<T>(body: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(body)))
}

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Collection sizes.
pub async fn status_handler(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    let (backend, stats) = run(&state, |c| Ok((c.backend_name(), c.stats()?))).await?;
    ok(StatusResponse::new(backend, stats))
}

// =============================================================================
// USERS
// =============================================================================

pub async fn list_users_handler(State(state): State<AppState>) -> ApiResult<UsersResponse> {
    let users = run(&state, |c| c.users()).await?;
    ok(UsersResponse::success(users))
}

/// Create or replace a user keyed on email.
pub async fn upsert_user_handler(
    State(state): State<AppState>,
    payload: Result<Json<UserProfile>, JsonRejection>,
) -> ApiResult<UpsertUserResponse> {
    let Json(profile) = payload?;
    let outcome = run(&state, move |c| c.upsert_user(profile)).await?;
    ok(UpsertUserResponse {
        success: true,
        created: outcome == Upsert::Created,
        error: None,
    })
}

/// Update bio and/or banner.
pub async fn update_profile_handler(
    State(state): State<AppState>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> ApiResult<UserResponse> {
    let Json(request) = payload?;
    let banner = request.banner.as_ref().map(|b| b.decode()).transpose()?;
    let user = run(&state, move |c| {
        c.update_profile(&request.username, request.bio, banner.as_ref())
    })
    .await?;
    ok(UserResponse::success(user))
}

// =============================================================================
// POSTS
// =============================================================================

pub async fn list_posts_handler(State(state): State<AppState>) -> ApiResult<PostsResponse> {
    let posts = run(&state, |c| c.posts()).await?;
    ok(PostsResponse::success(&posts))
}

pub async fn create_post_handler(
    State(state): State<AppState>,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> ApiResult<PostResponse> {
    let Json(request) = payload?;
    let (draft, upload) = request.into_parts()?;
    let post = run(&state, move |c| c.create_post(draft, upload.as_ref())).await?;
    ok(PostResponse::success(&post))
}

/// Delete a post owned by the caller.
pub async fn delete_post_handler(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
    payload: Result<Json<UsernameBody>, JsonRejection>,
) -> ApiResult<AckResponse> {
    let Path(id) = id?;
    let Json(body) = payload?;
    run(&state, move |c| c.delete_post(PostId(id), &body.username)).await?;
    ok(AckResponse::success())
}

/// `POST /posts/{id}/{action}`.
pub async fn post_action_handler(
    State(state): State<AppState>,
    params: Result<Path<(u64, String)>, PathRejection>,
    payload: Result<Json<ActionRequest>, JsonRejection>,
) -> ApiResult<PostResponse> {
    let Path((id, action)) = params?;
    let Json(request) = payload?;
    let action = request.post_action(&action)?;
    let result = run(&state, move |c| c.apply(PostId(id), &request.username, &action)).await?;
    ok(action_response(result))
}

/// `POST /posts/{id}/comments/{commentId}/{action}`.
pub async fn comment_action_handler(
    State(state): State<AppState>,
    params: Result<Path<(u64, u64, String)>, PathRejection>,
    payload: Result<Json<ActionRequest>, JsonRejection>,
) -> ApiResult<PostResponse> {
    let Path((id, comment, action)) = params?;
    let Json(request) = payload?;
    let action = request.comment_action(CommentId(comment), &action)?;
    let result = run(&state, move |c| c.apply(PostId(id), &request.username, &action)).await?;
    ok(action_response(result))
}

fn action_response(result: ActionResult) -> PostResponse {
    PostResponse {
        comment_id: result.comment_id,
        notification: result.notification,
        ..PostResponse::success(&result.post)
    }
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

/// Inbox of `?username=`, newest first.
pub async fn notifications_handler(
    State(state): State<AppState>,
    query: Result<Query<UsernameQuery>, QueryRejection>,
) -> ApiResult<NotificationsResponse> {
    let Query(query) = query?;
    let notifications = run(&state, move |c| c.notifications_for(&query.username)).await?;
    ok(NotificationsResponse::success(notifications))
}

pub async fn delete_notification_handler(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
    payload: Result<Json<UsernameBody>, JsonRejection>,
) -> ApiResult<AckResponse> {
    let Path(id) = id?;
    let Json(body) = payload?;
    run(&state, move |c| {
        c.delete_notification(NotificationId(id), &body.username)
    })
    .await?;
    ok(AckResponse::success())
}

/// Delete every notification addressed to the caller.
pub async fn clear_notifications_handler(
    State(state): State<AppState>,
    payload: Result<Json<UsernameBody>, JsonRejection>,
) -> ApiResult<ClearNotificationsResponse> {
    let Json(body) = payload?;
    let removed = run(&state, move |c| c.clear_notifications(&body.username)).await?;
    ok(ClearNotificationsResponse {
        success: true,
        removed,
        error: None,
    })
}

// =============================================================================
// SOCIAL GRAPH
// =============================================================================

pub async fn friends_handler(
    State(state): State<AppState>,
    query: Result<Query<UsernameQuery>, QueryRejection>,
) -> ApiResult<FriendsResponse> {
    let Query(query) = query?;
    let overview = run(&state, move |c| c.friends_overview(&query.username)).await?;
    ok(FriendsResponse::from(overview))
}

pub async fn friend_request_handler(
    State(state): State<AppState>,
    payload: Result<Json<FriendRequestBody>, JsonRejection>,
) -> ApiResult<AckResponse> {
    let Json(body) = payload?;
    let notification = run(&state, move |c| c.send_friend_request(&body.from, &body.to)).await?;
    ok(AckResponse::with_notification(notification))
}

pub async fn accept_friend_request_handler(
    State(state): State<AppState>,
    payload: Result<Json<FriendRequestBody>, JsonRejection>,
) -> ApiResult<AckResponse> {
    let Json(body) = payload?;
    let notification =
        run(&state, move |c| c.accept_friend_request(&body.from, &body.to)).await?;
    ok(AckResponse::with_notification(notification))
}

pub async fn follow_handler(
    State(state): State<AppState>,
    payload: Result<Json<FollowBody>, JsonRejection>,
) -> ApiResult<AckResponse> {
    let Json(body) = payload?;
    let notification = run(&state, move |c| c.follow(&body.follower, &body.followed)).await?;
    ok(AckResponse::with_notification(notification))
}

pub async fn unfollow_handler(
    State(state): State<AppState>,
    payload: Result<Json<FollowBody>, JsonRejection>,
) -> ApiResult<AckResponse> {
    let Json(body) = payload?;
    run(&state, move |c| c.unfollow(&body.follower, &body.followed)).await?;
    ok(AckResponse::with_message("Unfollowed successfully"))
}
