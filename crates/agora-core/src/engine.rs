//! # Post Aggregate Engine
//!
//! Applies every state transition a post supports: the three reaction
//! toggles, comments and replies at any depth, comment likes and poll votes.
//!
//! The engine mutates the post collection it is handed and reports what
//! happened as a [`PostOutcome`]. It never writes the store and never builds
//! notifications; the coordinator does both.

use crate::ids::IdGenerator;
use crate::notification::{Interaction, NotificationKind};
use crate::post::{Post, PostDraft};
use crate::primitives::MAX_TEXT_LENGTH;
use crate::{AgoraError, CommentId, PostId, Timestamp};

/// A state transition on one post, performed by an actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostAction {
    Like,
    Unlike,
    Report,
    Unreport,
    Bookmark,
    Unbookmark,
    Comment { text: String },
    Vote { option: i64 },
    LikeComment(CommentId),
    UnlikeComment(CommentId),
    Reply { parent: CommentId, text: String },
}

impl PostAction {
    /// Short name used in logs and routes.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Unlike => "unlike",
            Self::Report => "report",
            Self::Unreport => "unreport",
            Self::Bookmark => "bookmark",
            Self::Unbookmark => "unbookmark",
            Self::Comment { .. } => "comment",
            Self::Vote { .. } => "vote",
            Self::LikeComment(_) => "like_comment",
            Self::UnlikeComment(_) => "unlike_comment",
            Self::Reply { .. } => "reply",
        }
    }
}

/// What an accepted action produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostOutcome {
    /// Interaction to fan out, if the action concerns somebody.
    pub interaction: Option<Interaction>,
    /// Id of the comment or reply created by the action.
    pub comment_id: Option<CommentId>,
}

/// The PostEngine owns every mutation of the post collection.
pub struct PostEngine;

impl PostEngine {
    /// Build a post from a draft and append it to the feed.
    pub fn create(
        posts: &mut Vec<Post>,
        draft: PostDraft,
        ids: &IdGenerator,
        date: Timestamp,
    ) -> Result<PostId, AgoraError> {
        if draft.username.trim().is_empty() {
            return Err(AgoraError::InvalidArgument("Username is required".to_string()));
        }
        if draft.caption.chars().count() > MAX_TEXT_LENGTH {
            return Err(text_too_long());
        }

        let post = Post::from_draft(ids.next_post(), date, draft)?;
        let id = post.id;
        posts.push(post);
        Ok(id)
    }

    /// Remove a post owned by `username`, returning it so its media can be
    /// released.
    pub fn delete(posts: &mut Vec<Post>, id: PostId, username: &str) -> Result<Post, AgoraError> {
        let index = posts
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(post_not_found)?;
        if posts[index].username != username {
            return Err(AgoraError::Forbidden(
                "You can only delete your own posts".to_string(),
            ));
        }
        Ok(posts.remove(index))
    }

    /// Apply `action` by `actor` to post `id`.
    ///
    /// On error the post is left exactly as it was.
    pub fn apply(
        posts: &mut [Post],
        id: PostId,
        actor: &str,
        action: &PostAction,
        ids: &IdGenerator,
    ) -> Result<PostOutcome, AgoraError> {
        if actor.trim().is_empty() {
            return Err(AgoraError::InvalidArgument("Username is required".to_string()));
        }
        let post = posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(post_not_found)?;

        match action {
            PostAction::Like => {
                post.like(actor)?;
                Ok(PostOutcome::notify(
                    Interaction::new(NotificationKind::Like, actor, &post.username)
                        .about_post(post.id, &post.caption),
                ))
            }
            PostAction::Unlike => post.unlike(actor).map(|()| PostOutcome::default()),
            PostAction::Report => post.report(actor).map(|()| PostOutcome::default()),
            PostAction::Unreport => post.unreport(actor).map(|()| PostOutcome::default()),
            PostAction::Bookmark => post.bookmark(actor).map(|()| PostOutcome::default()),
            PostAction::Unbookmark => post.unbookmark(actor).map(|()| PostOutcome::default()),
            PostAction::Comment { text } => {
                validate_text(text)?;
                let comment_id = ids.next_comment();
                post.comments.add_comment(comment_id, actor, text)?;
                Ok(PostOutcome {
                    interaction: Some(
                        Interaction::new(NotificationKind::Comment, actor, &post.username)
                            .about_post(post.id, text),
                    ),
                    comment_id: Some(comment_id),
                })
            }
            PostAction::Vote { option } => {
                let poll = post.poll.as_mut().ok_or_else(|| {
                    AgoraError::NotFound("Post or poll not found".to_string())
                })?;
                poll.vote(actor, *option)?;
                Ok(PostOutcome::default())
            }
            PostAction::LikeComment(comment_id) => {
                let post_id = post.id;
                let comment = post.comments.like(*comment_id, actor)?;
                Ok(PostOutcome::notify(
                    Interaction::new(NotificationKind::CommentLike, actor, &comment.username)
                        .about_post(post_id, &comment.text),
                ))
            }
            PostAction::UnlikeComment(comment_id) => {
                post.comments.unlike(*comment_id, actor)?;
                Ok(PostOutcome::default())
            }
            PostAction::Reply { parent, text } => {
                validate_text(text)?;
                let parent_author = post.comments.find(*parent)?.username.clone();
                let reply_id = ids.next_comment();
                post.comments.add_reply(*parent, reply_id, actor, text)?;
                Ok(PostOutcome {
                    interaction: Some(
                        Interaction::new(NotificationKind::CommentReply, actor, &parent_author)
                            .about_post(post.id, text),
                    ),
                    comment_id: Some(reply_id),
                })
            }
        }
    }
}

impl PostOutcome {
    fn notify(interaction: Interaction) -> Self {
        Self {
            interaction: Some(interaction),
            comment_id: None,
        }
    }
}

fn validate_text(text: &str) -> Result<(), AgoraError> {
    if text.trim().is_empty() {
        return Err(AgoraError::InvalidArgument("Text is required".to_string()));
    }
    if text.chars().count() > MAX_TEXT_LENGTH {
        return Err(text_too_long());
    }
    Ok(())
}

fn text_too_long() -> AgoraError {
    AgoraError::InvalidArgument(format!(
        "Text exceeds {} characters",
        MAX_TEXT_LENGTH
    ))
}

fn post_not_found() -> AgoraError {
    AgoraError::NotFound("Post not found".to_string())
}

// =============================================================================
// TESTS
// =============================================================================
