//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API. Field names are
//! camelCase on the wire. Every response carries `success` and `error`.

use agora_core::{
    AgoraError, CommentId, FriendRequest, FriendsOverview, MediaUpload, NestedJson, Notification,
    Poll, Post, PostAction, PostDraft, PostId, Stats, Timestamp, User,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// ERROR ENVELOPE
// =============================================================================

/// Body of every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    /// Error class, e.g. `conflict`.
    pub kind: String,
    pub error: Option<String>,
}

impl ErrorResponse {
    pub fn new(kind: &str, message: &str) -> Self {
        Self {
            success: false,
            kind: kind.to_string(),
            error: Some(message.to_string()),
        }
    }

    pub fn from_error(error: &AgoraError) -> Self {
        Self {
            success: false,
            kind: error.kind().to_string(),
            error: Some(error.to_string()),
        }
    }
}

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub success: bool,
    pub status: String,
    pub version: String,
    pub error: Option<String>,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            success: true,
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            error: None,
        }
    }
}

/// Collection sizes and the active backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    pub backend: String,
    pub users: usize,
    pub posts: usize,
    pub comments: usize,
    pub notifications: usize,
    pub graph_entries: usize,
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn new(backend: &str, stats: Stats) -> Self {
        Self {
            success: true,
            backend: backend.to_string(),
            users: stats.users,
            posts: stats.posts,
            comments: stats.comments,
            notifications: stats.notifications,
            graph_entries: stats.graph_entries,
            error: None,
        }
    }
}

// =============================================================================
// GENERIC ACKNOWLEDGEMENT
// =============================================================================

/// Response of operations that return nothing but success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Notification fanned out by the operation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
    pub error: Option<String>,
}

impl AckResponse {
    pub fn success() -> Self {
        Self {
            success: true,
            message: None,
            notification: None,
            error: None,
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::success()
        }
    }

    pub fn with_notification(notification: Option<Notification>) -> Self {
        Self {
            notification,
            ..Self::success()
        }
    }
}

// =============================================================================
// MEDIA
// =============================================================================

/// An uploaded image embedded in a JSON body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPayload {
    /// Original file name; its extension selects the stored type.
    pub filename: String,
    /// File contents, standard base64.
    pub data: String,
}

impl MediaPayload {
    /// Decode the payload into an upload.
    pub fn decode(&self) -> Result<MediaUpload, AgoraError> {
        let bytes = STANDARD.decode(self.data.trim()).map_err(|e| {
            AgoraError::InvalidArgument(format!("Media data is not valid base64: {}", e))
        })?;
        Ok(MediaUpload {
            filename: self.filename.clone(),
            bytes,
        })
    }

    pub fn encode(filename: &str, bytes: &[u8]) -> Self {
        Self {
            filename: filename.to_string(),
            data: STANDARD.encode(bytes),
        }
    }
}

// =============================================================================
// USERS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersResponse {
    pub success: bool,
    pub users: Vec<User>,
    pub error: Option<String>,
}

impl UsersResponse {
    pub fn success(users: Vec<User>) -> Self {
        Self {
            success: true,
            users,
            error: None,
        }
    }
}

/// Result of `POST /users`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertUserResponse {
    pub success: bool,
    /// True when a new record was appended.
    pub created: bool,
    pub error: Option<String>,
}

/// Profile update: new bio and/or banner image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateProfileRequest {
    pub username: String,
    pub bio: Option<String>,
    pub banner: Option<MediaPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: Option<User>,
    pub error: Option<String>,
}

impl UserResponse {
    pub fn success(user: User) -> Self {
        Self {
            success: true,
            user: Some(user),
            error: None,
        }
    }
}

// =============================================================================
// POSTS
// =============================================================================

/// Body of `POST /posts`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub username: String,
    pub user_email: Option<String>,
    pub caption: String,
    pub tag: Option<String>,
    pub poll_options: Option<Vec<String>>,
    pub media: Option<MediaPayload>,
}

impl CreatePostRequest {
    /// Split into a draft and the decoded upload.
    pub fn into_parts(self) -> Result<(PostDraft, Option<MediaUpload>), AgoraError> {
        let upload = self.media.as_ref().map(MediaPayload::decode).transpose()?;
        let draft = PostDraft {
            username: self.username,
            user_email: self.user_email,
            caption: self.caption,
            tag: self.tag.filter(|t| !t.trim().is_empty()),
            media: None,
            poll_options: self.poll_options,
        };
        Ok((draft, upload))
    }
}

/// Body of every post and comment action. Fields an action does not use are
/// ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActionRequest {
    pub username: String,
    pub text: Option<String>,
    pub option_index: Option<i64>,
}

impl ActionRequest {
    /// Resolve a `/posts/{id}/{action}` name.
    pub fn post_action(&self, action: &str) -> Result<PostAction, AgoraError> {
        Ok(match action {
            "like" => PostAction::Like,
            "unlike" => PostAction::Unlike,
            "report" => PostAction::Report,
            "unreport" => PostAction::Unreport,
            "bookmark" => PostAction::Bookmark,
            "unbookmark" => PostAction::Unbookmark,
            "comment" => PostAction::Comment { text: self.text() },
            "vote" => PostAction::Vote {
                option: self.option_index.ok_or_else(|| {
                    AgoraError::InvalidArgument("optionIndex is required".to_string())
                })?,
            },
            other => return Err(unknown_action(other)),
        })
    }

    /// Resolve a `/posts/{id}/comments/{commentId}/{action}` name.
    pub fn comment_action(&self, comment: CommentId, action: &str) -> Result<PostAction, AgoraError> {
        Ok(match action {
            "like" => PostAction::LikeComment(comment),
            "unlike" => PostAction::UnlikeComment(comment),
            "reply" => PostAction::Reply {
                parent: comment,
                text: self.text(),
            },
            other => return Err(unknown_action(other)),
        })
    }

    fn text(&self) -> String {
        self.text.clone().unwrap_or_default()
    }
}

fn unknown_action(action: &str) -> AgoraError {
    AgoraError::NotFound(format!("Unknown action: {}", action))
}

/// Client view of a post: counters, media type and the nested thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: PostId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    pub caption: String,
    pub tag: Option<String>,
    pub date: Timestamp,
    pub likes: usize,
    pub reports: usize,
    pub liked_by: BTreeSet<String>,
    pub reported_by: BTreeSet<String>,
    pub bookmarked_by: BTreeSet<String>,
    pub media: Option<String>,
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<Poll>,
    pub comments: NestedJson,
}

impl From<&Post> for PostView {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            username: post.username.clone(),
            user_email: post.user_email.clone(),
            caption: post.caption.clone(),
            tag: post.tag.clone(),
            date: post.date,
            likes: post.likes(),
            reports: post.reports(),
            liked_by: post.liked_by().clone(),
            reported_by: post.reported_by().clone(),
            bookmarked_by: post.bookmarked_by().clone(),
            media: post.media.clone(),
            media_type: post.media_type().map(str::to_string),
            poll: post.poll.clone(),
            comments: post.comments.nested_json(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostsResponse {
    pub success: bool,
    pub posts: Vec<PostView>,
    pub error: Option<String>,
}

impl PostsResponse {
    pub fn success(posts: &[Post]) -> Self {
        Self {
            success: true,
            posts: posts.iter().map(PostView::from).collect(),
            error: None,
        }
    }
}

/// A post after it was created or acted upon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub success: bool,
    pub post: Option<PostView>,
    /// Id of the comment or reply the action created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<CommentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
    pub error: Option<String>,
}

impl PostResponse {
    pub fn success(post: &Post) -> Self {
        Self {
            success: true,
            post: Some(PostView::from(post)),
            comment_id: None,
            notification: None,
            error: None,
        }
    }
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

/// `?username=` of the read endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UsernameQuery {
    pub username: String,
}

/// `{username}` body of delete endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UsernameBody {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsResponse {
    pub success: bool,
    pub notifications: Vec<Notification>,
    pub error: Option<String>,
}

impl NotificationsResponse {
    pub fn success(notifications: Vec<Notification>) -> Self {
        Self {
            success: true,
            notifications,
            error: None,
        }
    }
}

/// Result of `DELETE /notifications`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearNotificationsResponse {
    pub success: bool,
    pub removed: usize,
    pub error: Option<String>,
}

// =============================================================================
// SOCIAL GRAPH
// =============================================================================

/// Body of the friend request endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FriendRequestBody {
    pub from: String,
    pub to: String,
}

/// Body of follow and unfollow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowBody {
    pub follower: String,
    pub followed: String,
}

/// A user's graph entry plus the user directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendsResponse {
    pub success: bool,
    pub friends: BTreeSet<String>,
    pub requests: Vec<FriendRequest>,
    pub following: BTreeSet<String>,
    pub followers: BTreeSet<String>,
    pub users: Vec<User>,
    pub error: Option<String>,
}

impl From<FriendsOverview> for FriendsResponse {
    fn from(overview: FriendsOverview) -> Self {
        Self {
            success: true,
            friends: overview.entry.friends,
            requests: overview.entry.requests,
            following: overview.entry.following,
            followers: overview.entry.followers,
            users: overview.users,
            error: None,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_payload_decodes_base64() {
        let payload = MediaPayload::encode("cat.gif", b"GIF89a");
        let upload = payload.decode().expect("decode");
        assert_eq!(upload.filename, "cat.gif");
        assert_eq!(upload.bytes, b"GIF89a");
    }

    #[test]
    fn media_payload_rejects_garbage() {
        let payload = MediaPayload {
            filename: "cat.gif".to_string(),
            data: "***".to_string(),
        };
        assert!(matches!(payload.decode(), Err(AgoraError::InvalidArgument(_))));
    }

    #[test]
    fn action_names_resolve() {
        let body = ActionRequest {
            username: "bob".to_string(),
            text: Some("hi".to_string()),
            option_index: Some(1),
        };
        assert_eq!(body.post_action("like").expect("like"), PostAction::Like);
        assert_eq!(
            body.post_action("vote").expect("vote"),
            PostAction::Vote { option: 1 }
        );
        assert_eq!(
            body.comment_action(CommentId(7), "reply").expect("reply"),
            PostAction::Reply {
                parent: CommentId(7),
                text: "hi".to_string()
            }
        );
        assert!(matches!(body.post_action("share"), Err(AgoraError::NotFound(_))));
    }

    #[test]
    fn vote_without_index_is_invalid() {
        let body = ActionRequest {
            username: "bob".to_string(),
            ..ActionRequest::default()
        };
        assert!(matches!(
            body.post_action("vote"),
            Err(AgoraError::InvalidArgument(_))
        ));
    }

    #[test]
    fn create_request_reads_camel_case() {
        let body: CreatePostRequest = serde_json::from_str(
            r#"{"username":"alice","userEmail":"a@x","caption":"hi","tag":"","pollOptions":["a","b"]}"#,
        )
        .expect("parse");
        let (draft, upload) = body.into_parts().expect("parts");
        assert!(upload.is_none());
        assert_eq!(draft.user_email.as_deref(), Some("a@x"));
        assert_eq!(draft.tag, None);
        assert_eq!(draft.poll_options.map(|o| o.len()), Some(2));
    }
}
