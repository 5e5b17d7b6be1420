//! # Notification Fan-out
//!
//! Engines never build notifications themselves. Every accepted state change
//! that concerns somebody else is described as an [`Interaction`] and handed
//! to [`fan_out`], which is the single place that decides:
//!
//! - whether a notification is produced at all (never when the actor is the
//!   recipient), and
//! - the message text, including excerpt truncation.
//!
//! The notification collection is append-only; repeated identical
//! interactions each produce their own record.

use crate::primitives::{ELLIPSIS, EXCERPT_LIMIT};
use crate::{AgoraError, NotificationId, PostId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// NOTIFICATION RECORD
// =============================================================================

/// The seven interaction types that notify someone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Comment,
    CommentLike,
    CommentReply,
    FriendRequest,
    FriendAccept,
    Follow,
}

impl NotificationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::CommentLike => "comment_like",
            Self::CommentReply => "comment_reply",
            Self::FriendRequest => "friend_request",
            Self::FriendAccept => "friend_accept",
            Self::Follow => "follow",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub actor: String,
    pub message: String,
    pub recipient: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<PostId>,
    pub date: Timestamp,
}

// =============================================================================
// FAN-OUT
// =============================================================================

/// An accepted interaction that may concern another user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub kind: NotificationKind,
    pub actor: String,
    pub recipient: String,
    /// Free text quoted in the message (caption, comment or reply text).
    pub excerpt: Option<String>,
    pub post_id: Option<PostId>,
}

impl Interaction {
    pub fn new(kind: NotificationKind, actor: &str, recipient: &str) -> Self {
        Self {
            kind,
            actor: actor.to_string(),
            recipient: recipient.to_string(),
            excerpt: None,
            post_id: None,
        }
    }

    /// Attach the related post and the text to quote.
    #[must_use]
    pub fn about_post(mut self, post_id: PostId, excerpt: &str) -> Self {
        self.post_id = Some(post_id);
        self.excerpt = Some(excerpt.to_string());
        self
    }

    /// True when the actor would notify themselves.
    pub fn is_self_directed(&self) -> bool {
        self.actor == self.recipient
    }
}

/// Turn an interaction into zero or one notification.
pub fn fan_out(
    interaction: &Interaction,
    id: NotificationId,
    date: Timestamp,
) -> Option<Notification> {
    if interaction.is_self_directed() {
        return None;
    }

    Some(Notification {
        id,
        kind: interaction.kind,
        actor: interaction.actor.clone(),
        message: message_for(interaction.kind, interaction.excerpt.as_deref().unwrap_or("")),
        recipient: interaction.recipient.clone(),
        post_id: interaction.post_id,
        date,
    })
}

fn message_for(kind: NotificationKind, text: &str) -> String {
    match kind {
        NotificationKind::Like => format!("liked your post: \"{}\"", excerpt(text)),
        NotificationKind::Comment => format!("commented on your post: \"{}\"", excerpt(text)),
        NotificationKind::CommentLike => format!("liked your comment: \"{}\"", excerpt(text)),
        NotificationKind::CommentReply => {
            format!("replied to your comment: \"{}\"", excerpt(text))
        }
        NotificationKind::FriendRequest => "sent you a friend request".to_string(),
        NotificationKind::FriendAccept => "accepted your friend request".to_string(),
        NotificationKind::Follow => "started following you".to_string(),
    }
}

/// First `EXCERPT_LIMIT` characters of `text`, plus an ellipsis if it was cut.
pub fn excerpt(text: &str) -> String {
    let mut chars = text.chars();
    let mut out: String = chars.by_ref().take(EXCERPT_LIMIT).collect();
    if chars.next().is_some() {
        out.push_str(ELLIPSIS);
    }
    out
}

// =============================================================================
// INBOX QUERIES
// =============================================================================

/// Notifications addressed to `recipient`, newest first.
pub fn inbox(notifications: &[Notification], recipient: &str) -> Vec<Notification> {
    let mut mine: Vec<Notification> = notifications
        .iter()
        .filter(|n| n.recipient == recipient)
        .cloned()
        .collect();
    mine.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
    mine
}

/// Remove one notification owned by `recipient`.
pub fn dismiss(
    notifications: &mut Vec<Notification>,
    id: NotificationId,
    recipient: &str,
) -> Result<Notification, AgoraError> {
    let index = notifications
        .iter()
        .position(|n| n.id == id)
        .ok_or_else(|| AgoraError::NotFound("Notification not found".to_string()))?;

    if notifications[index].recipient != recipient {
        return Err(AgoraError::Forbidden(
            "You can only delete your own notifications".to_string(),
        ));
    }
    Ok(notifications.remove(index))
}

/// Remove every notification addressed to `recipient`; returns how many.
pub fn dismiss_all(notifications: &mut Vec<Notification>, recipient: &str) -> usize {
    let before = notifications.len();
    notifications.retain(|n| n.recipient != recipient);
    before - notifications.len()
}

// =============================================================================
// TESTS
// =============================================================================
