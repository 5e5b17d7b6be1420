//! # Comment Threads
//!
//! A post's comments form a tree of unbounded depth. The tree is stored as a
//! flat table keyed by `CommentId`, where every node keeps a reference to its
//! parent and the ordered ids of its replies. There is no recursive ownership,
//! lookup of any node is a single map access, and every walk is iterative so
//! thread depth never touches the call stack.
//!
//! ## Persistence
//!
//! On disk a thread is a flat list of records in depth-first pre-order, each
//! carrying its `parentId`. Parents always precede their replies, so loading
//! is one linear pass.
//!
//! ## Nested View
//!
//! `CommentThread::nested_json` renders the nested `{..., replies: [...]}`
//! shape for API consumers. The JSON text is produced by one pre-order pass
//! and carried as a raw value, so neither rendering, serializing nor dropping
//! it grows the stack with thread depth.

use crate::{AgoraError, CommentId};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use serde_json::value::RawValue;
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// COMMENT NODE
// =============================================================================

/// A single comment or reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: CommentId,
    /// Author username.
    pub username: String,
    pub text: String,
    pub liked_by: BTreeSet<String>,
    parent: Option<CommentId>,
    replies: Vec<CommentId>,
}

impl Comment {
    fn new(id: CommentId, username: &str, text: &str, parent: Option<CommentId>) -> Self {
        Self {
            id,
            username: username.to_string(),
            text: text.to_string(),
            liked_by: BTreeSet::new(),
            parent,
            replies: Vec::new(),
        }
    }

    /// The comment this one replies to, `None` for top-level comments.
    pub fn parent(&self) -> Option<CommentId> {
        self.parent
    }

    /// Ids of the direct replies, oldest first.
    pub fn replies(&self) -> &[CommentId] {
        &self.replies
    }
}

// =============================================================================
// THREAD
// =============================================================================

/// All comments of one post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CommentRecord>", into = "Vec<CommentRecord>")]
pub struct CommentThread {
    nodes: BTreeMap<CommentId, Comment>,
    roots: Vec<CommentId>,
}

/// Flat on-disk record of one comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    pub id: CommentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<CommentId>,
    pub username: String,
    pub text: String,
    #[serde(default)]
    pub liked_by: BTreeSet<String>,
}

/// Nested JSON rendering of a thread:
/// `[{"id", "username", "text", "likedBy", "replies": [...]}, ...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedJson(String);

impl NestedJson {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Serialize for NestedJson {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let raw: &RawValue = serde_json::from_str(&self.0).map_err(serde::ser::Error::custom)?;
        raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NestedJson {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        Ok(Self(raw.get().to_string()))
    }
}

impl CommentThread {
    /// Create an empty thread.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of comments at every depth.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids of the top-level comments, oldest first.
    pub fn roots(&self) -> &[CommentId] {
        &self.roots
    }

    /// Look up a comment anywhere in the tree.
    pub fn get(&self, id: CommentId) -> Option<&Comment> {
        self.nodes.get(&id)
    }

    /// Look up a comment anywhere in the tree, failing with `NotFound`.
    pub fn find(&self, id: CommentId) -> Result<&Comment, AgoraError> {
        self.nodes.get(&id).ok_or_else(comment_not_found)
    }

    fn find_mut(&mut self, id: CommentId) -> Result<&mut Comment, AgoraError> {
        self.nodes.get_mut(&id).ok_or_else(comment_not_found)
    }

    /// Number of ancestors above `id` (0 for a top-level comment).
    pub fn depth_of(&self, id: CommentId) -> Option<usize> {
        let mut depth = 0;
        let mut cursor = self.nodes.get(&id)?.parent;
        while let Some(parent) = cursor {
            depth += 1;
            cursor = self.nodes.get(&parent).and_then(|c| c.parent);
        }
        Some(depth)
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Append a top-level comment.
    pub fn add_comment(
        &mut self,
        id: CommentId,
        username: &str,
        text: &str,
    ) -> Result<&Comment, AgoraError> {
        self.ensure_unused(id)?;
        self.roots.push(id);
        Ok(&*self
            .nodes
            .entry(id)
            .or_insert_with(|| Comment::new(id, username, text, None)))
    }

    /// Append a reply under `parent`, which may sit at any depth.
    pub fn add_reply(
        &mut self,
        parent: CommentId,
        id: CommentId,
        username: &str,
        text: &str,
    ) -> Result<&Comment, AgoraError> {
        self.ensure_unused(id)?;
        self.find_mut(parent)?.replies.push(id);
        Ok(&*self
            .nodes
            .entry(id)
            .or_insert_with(|| Comment::new(id, username, text, Some(parent))))
    }

    /// Add `username` to the likes of comment `id`.
    pub fn like(&mut self, id: CommentId, username: &str) -> Result<&Comment, AgoraError> {
        let comment = self.find_mut(id)?;
        if !comment.liked_by.insert(username.to_string()) {
            return Err(AgoraError::Conflict(
                "User already liked this comment".to_string(),
            ));
        }
        Ok(&*comment)
    }

    /// Remove `username` from the likes of comment `id`.
    pub fn unlike(&mut self, id: CommentId, username: &str) -> Result<&Comment, AgoraError> {
        let comment = self.find_mut(id)?;
        if !comment.liked_by.remove(username) {
            return Err(AgoraError::Conflict(
                "You have not liked this comment".to_string(),
            ));
        }
        Ok(&*comment)
    }

    fn ensure_unused(&self, id: CommentId) -> Result<(), AgoraError> {
        if self.nodes.contains_key(&id) {
            return Err(AgoraError::Internal(format!("Comment id {} already in use", id)));
        }
        Ok(())
    }

    // =========================================================================
    // TRAVERSAL
    // =========================================================================

    /// Depth-first pre-order walk: each top-level comment, then its replies
    /// recursively, then the next top-level comment.
    pub fn depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            thread: self,
            stack: self.roots.iter().rev().map(|id| (*id, 0)).collect(),
        }
    }

    /// Render the nested view as JSON text.
    ///
    /// Pre-order guarantees a node is followed either by its first reply
    /// (one level deeper) or by a node at its own depth or shallower, so the
    /// open `replies` arrays can be tracked with the depth alone.
    pub fn nested_json(&self) -> NestedJson {
        let mut out = String::from("[");
        let mut previous: Option<usize> = None;

        for (depth, comment) in self.depth_first() {
            if let Some(prev) = previous.filter(|prev| depth <= *prev) {
                for _ in depth..=prev {
                    out.push_str("]}");
                }
                out.push(',');
            }
            let liked_by: Vec<Value> = comment
                .liked_by
                .iter()
                .map(|u| Value::from(u.as_str()))
                .collect();
            out.push_str(&format!(
                "{{\"id\":{},\"username\":{},\"text\":{},\"likedBy\":{},\"replies\":[",
                comment.id.0,
                Value::from(comment.username.as_str()),
                Value::from(comment.text.as_str()),
                Value::Array(liked_by),
            ));
            previous = Some(depth);
        }

        if let Some(prev) = previous {
            for _ in 0..=prev {
                out.push_str("]}");
            }
        }
        out.push(']');
        NestedJson(out)
    }
}

/// Iterator returned by [`CommentThread::depth_first`], yielding `(depth, comment)`.
pub struct DepthFirst<'a> {
    thread: &'a CommentThread,
    stack: Vec<(CommentId, usize)>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = (usize, &'a Comment);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((id, depth)) = self.stack.pop() {
            if let Some(comment) = self.thread.nodes.get(&id) {
                self.stack
                    .extend(comment.replies.iter().rev().map(|r| (*r, depth + 1)));
                return Some((depth, comment));
            }
        }
        None
    }
}

fn comment_not_found() -> AgoraError {
    AgoraError::NotFound("Comment not found".to_string())
}

// =============================================================================
// SERDE CONVERSIONS
// =============================================================================

impl From<CommentThread> for Vec<CommentRecord> {
    fn from(thread: CommentThread) -> Self {
        thread
            .depth_first()
            .map(|(_, c)| CommentRecord {
                id: c.id,
                parent_id: c.parent,
                username: c.username.clone(),
                text: c.text.clone(),
                liked_by: c.liked_by.clone(),
            })
            .collect()
    }
}

impl TryFrom<Vec<CommentRecord>> for CommentThread {
    type Error = String;

    fn try_from(records: Vec<CommentRecord>) -> Result<Self, Self::Error> {
        let mut thread = Self::new();
        for record in records {
            if thread.nodes.contains_key(&record.id) {
                return Err(format!("duplicate comment id {}", record.id));
            }
            match record.parent_id {
                Some(parent) => match thread.nodes.get_mut(&parent) {
                    Some(node) => node.replies.push(record.id),
                    None => {
                        return Err(format!(
                            "comment {} refers to unknown parent {}",
                            record.id, parent
                        ));
                    }
                },
                None => thread.roots.push(record.id),
            }
            let mut comment =
                Comment::new(record.id, &record.username, &record.text, record.parent_id);
            comment.liked_by = record.liked_by;
            thread.nodes.insert(record.id, comment);
        }
        Ok(thread)
    }
}

// =============================================================================
// TESTS
// =============================================================================
