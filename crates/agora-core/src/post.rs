//! # Posts
//!
//! A post owns its poll, its comment thread and three reaction sets. Like and
//! report counts are never stored authoritatively: they are always derived
//! from `liked_by` / `reported_by`, and counts found in a loaded document are
//! discarded in favor of the sets.

use crate::comment::CommentThread;
use crate::poll::Poll;
use crate::{AgoraError, PostId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Media type recorded for posts carrying an uploaded file.
const IMAGE_MEDIA_TYPE: &str = "image";

/// A post in the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PostDocument", into = "PostDocument")]
pub struct Post {
    pub id: PostId,
    /// Owner username.
    pub username: String,
    pub user_email: Option<String>,
    pub caption: String,
    pub tag: Option<String>,
    /// Public reference of the attached image, if any.
    pub media: Option<String>,
    pub poll: Option<Poll>,
    pub date: Timestamp,
    pub comments: CommentThread,
    liked_by: BTreeSet<String>,
    reported_by: BTreeSet<String>,
    bookmarked_by: BTreeSet<String>,
}

/// Input for creating a post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDraft {
    pub username: String,
    pub user_email: Option<String>,
    pub caption: String,
    pub tag: Option<String>,
    pub media: Option<String>,
    /// Poll option labels; `None` for a post without a poll.
    pub poll_options: Option<Vec<String>>,
}

impl Post {
    /// Build a new post from a draft with empty reaction sets.
    pub fn from_draft(id: PostId, date: Timestamp, draft: PostDraft) -> Result<Self, AgoraError> {
        let poll = draft.poll_options.map(Poll::new).transpose()?;
        Ok(Self {
            id,
            username: draft.username,
            user_email: draft.user_email,
            caption: draft.caption,
            tag: draft.tag.filter(|t| !t.trim().is_empty()),
            media: draft.media,
            poll,
            date,
            comments: CommentThread::new(),
            liked_by: BTreeSet::new(),
            reported_by: BTreeSet::new(),
            bookmarked_by: BTreeSet::new(),
        })
    }

    pub fn likes(&self) -> usize {
        self.liked_by.len()
    }

    pub fn reports(&self) -> usize {
        self.reported_by.len()
    }

    pub fn liked_by(&self) -> &BTreeSet<String> {
        &self.liked_by
    }

    pub fn reported_by(&self) -> &BTreeSet<String> {
        &self.reported_by
    }

    pub fn bookmarked_by(&self) -> &BTreeSet<String> {
        &self.bookmarked_by
    }

    /// `"image"` when the post carries media.
    pub fn media_type(&self) -> Option<&'static str> {
        self.media.as_ref().map(|_| IMAGE_MEDIA_TYPE)
    }

    // =========================================================================
    // REACTION TOGGLES
    // =========================================================================

    pub fn like(&mut self, username: &str) -> Result<(), AgoraError> {
        toggle_on(&mut self.liked_by, username, "User already liked this post")
    }

    pub fn unlike(&mut self, username: &str) -> Result<(), AgoraError> {
        toggle_off(&mut self.liked_by, username, "You have not liked this post")
    }

    pub fn report(&mut self, username: &str) -> Result<(), AgoraError> {
        toggle_on(&mut self.reported_by, username, "User already reported this post")
    }

    pub fn unreport(&mut self, username: &str) -> Result<(), AgoraError> {
        toggle_off(&mut self.reported_by, username, "You have not reported this post")
    }

    pub fn bookmark(&mut self, username: &str) -> Result<(), AgoraError> {
        toggle_on(
            &mut self.bookmarked_by,
            username,
            "User already bookmarked this post",
        )
    }

    pub fn unbookmark(&mut self, username: &str) -> Result<(), AgoraError> {
        toggle_off(
            &mut self.bookmarked_by,
            username,
            "You have not bookmarked this post",
        )
    }
}

fn toggle_on(set: &mut BTreeSet<String>, username: &str, conflict: &str) -> Result<(), AgoraError> {
    if set.contains(username) {
        return Err(AgoraError::Conflict(conflict.to_string()));
    }
    set.insert(username.to_string());
    Ok(())
}

fn toggle_off(set: &mut BTreeSet<String>, username: &str, conflict: &str) -> Result<(), AgoraError> {
    if !set.remove(username) {
        return Err(AgoraError::Conflict(conflict.to_string()));
    }
    Ok(())
}

// =============================================================================
// DOCUMENT SHAPE
// =============================================================================

/// The persisted form of a post, including the derived counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostDocument {
    id: PostId,
    username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_email: Option<String>,
    #[serde(default)]
    caption: String,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    date: Timestamp,
    /// Written for readers of the raw file; ignored on load.
    #[serde(default)]
    likes: usize,
    /// Written for readers of the raw file; ignored on load.
    #[serde(default)]
    reports: usize,
    #[serde(default)]
    comments: CommentThread,
    #[serde(default)]
    media: Option<String>,
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    poll: Option<Poll>,
    #[serde(default)]
    liked_by: BTreeSet<String>,
    #[serde(default)]
    reported_by: BTreeSet<String>,
    #[serde(default)]
    bookmarked_by: BTreeSet<String>,
}

impl From<PostDocument> for Post {
    fn from(doc: PostDocument) -> Self {
        Self {
            id: doc.id,
            username: doc.username,
            user_email: doc.user_email,
            caption: doc.caption,
            tag: doc.tag,
            media: doc.media,
            poll: doc.poll,
            date: doc.date,
            comments: doc.comments,
            liked_by: doc.liked_by,
            reported_by: doc.reported_by,
            bookmarked_by: doc.bookmarked_by,
        }
    }
}

impl From<Post> for PostDocument {
    fn from(post: Post) -> Self {
        Self {
            likes: post.likes(),
            reports: post.reports(),
            media_type: post.media_type().map(str::to_string),
            id: post.id,
            username: post.username,
            user_email: post.user_email,
            caption: post.caption,
            tag: post.tag,
            date: post.date,
            comments: post.comments,
            media: post.media,
            poll: post.poll,
            liked_by: post.liked_by,
            reported_by: post.reported_by,
            bookmarked_by: post.bookmarked_by,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post() -> Post {
        let date = chrono::Utc
            .with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .single()
            .expect("valid date");
        Post::from_draft(
            PostId(1),
            date,
            PostDraft {
                username: "alice".to_string(),
                caption: "hello".to_string(),
                ..PostDraft::default()
            },
        )
        .expect("post")
    }

    #[test]
    fn like_then_unlike_restores_baseline() {
        let mut p = post();
        let baseline = p.clone();

        p.like("bob").expect("like");
        assert_eq!(p.likes(), 1);
        assert!(matches!(p.like("bob"), Err(AgoraError::Conflict(_))));
        assert_eq!(p.likes(), 1);

        p.unlike("bob").expect("unlike");
        assert_eq!(p, baseline);
    }

    #[test]
    fn report_and_bookmark_are_independent_sets() {
        let mut p = post();
        p.report("bob").expect("report");
        p.bookmark("bob").expect("bookmark");

        assert_eq!(p.reports(), 1);
        assert_eq!(p.likes(), 0);
        assert!(p.bookmarked_by().contains("bob"));
        assert!(matches!(p.unbookmark("carol"), Err(AgoraError::Conflict(_))));
    }

    #[test]
    fn stored_counts_are_ignored_on_load() {
        let json = r#"{
            "id": 7, "username": "alice", "caption": "hi",
            "date": "2024-05-01T12:00:00Z",
            "likes": 99, "reports": 0,
            "likedBy": ["bob"], "reportedBy": [], "bookmarkedBy": []
        }"#;
        let p: Post = serde_json::from_str(json).expect("load");
        assert_eq!(p.likes(), 1);

        let out = serde_json::to_value(&p).expect("serialize");
        assert_eq!(out["likes"], 1);
        assert_eq!(out["reports"], 0);
        assert_eq!(out["mediaType"], serde_json::Value::Null);
    }

    #[test]
    fn media_type_follows_media() {
        let mut p = post();
        p.media = Some("/uploads/x.png".to_string());
        assert_eq!(p.media_type(), Some("image"));
    }

    #[test]
    fn draft_with_bad_poll_is_rejected() {
        let result = Post::from_draft(
            PostId(2),
            chrono::Utc::now(),
            PostDraft {
                username: "alice".to_string(),
                poll_options: Some(vec!["lonely".to_string()]),
                ..PostDraft::default()
            },
        );
        assert!(matches!(result, Err(AgoraError::InvalidArgument(_))));
    }
}
