//! # Social Graph Engine
//!
//! Per-user friend lists, pending friend requests and directed follow edges.
//!
//! Two relations are kept symmetric by every mutation:
//! - `a ∈ friends(b)` iff `b ∈ friends(a)`
//! - `a ∈ following(b)` iff `b ∈ followers(a)`
//!
//! Entries are created lazily, with empty sets, the first time a mutation
//! touches a username. Read-only queries never create entries.

use crate::notification::{Interaction, NotificationKind};
use crate::user::{self, User};
use crate::{AgoraError, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// ENTRIES
// =============================================================================

/// A pending friend request, stored on the recipient's entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRequest {
    pub from: String,
    pub to: String,
    pub date: Timestamp,
}

/// The graph record of one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEntry {
    pub username: String,
    #[serde(default)]
    pub friends: BTreeSet<String>,
    /// Incoming requests, oldest first.
    #[serde(default)]
    pub requests: Vec<FriendRequest>,
    #[serde(default)]
    pub following: BTreeSet<String>,
    #[serde(default)]
    pub followers: BTreeSet<String>,
}

impl GraphEntry {
    fn empty(username: &str) -> Self {
        Self {
            username: username.to_string(),
            ..Self::default()
        }
    }

    fn has_request_from(&self, from: &str) -> bool {
        self.requests.iter().any(|r| r.from == from)
    }
}

// =============================================================================
// GRAPH
// =============================================================================

/// All graph entries keyed by username.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<GraphEntry>", into = "Vec<GraphEntry>")]
pub struct SocialGraph {
    entries: BTreeMap<String, GraphEntry>,
}

impl From<Vec<GraphEntry>> for SocialGraph {
    fn from(entries: Vec<GraphEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| (e.username.clone(), e))
                .collect(),
        }
    }
}

impl From<SocialGraph> for Vec<GraphEntry> {
    fn from(graph: SocialGraph) -> Self {
        graph.entries.into_values().collect()
    }
}

impl SocialGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, username: &str) -> Option<&GraphEntry> {
        self.entries.get(username)
    }

    /// The entry for `username`, or an empty one when none was ever written.
    pub fn overview(&self, username: &str) -> GraphEntry {
        self.entries
            .get(username)
            .cloned()
            .unwrap_or_else(|| GraphEntry::empty(username))
    }

    fn entry_mut(&mut self, username: &str) -> &mut GraphEntry {
        self.entries
            .entry(username.to_string())
            .or_insert_with(|| GraphEntry::empty(username))
    }

    // =========================================================================
    // FRIENDS
    // =========================================================================

    /// Queue a friend request from `from` to `to`.
    pub fn send_friend_request(
        &mut self,
        users: &[User],
        from: &str,
        to: &str,
        date: Timestamp,
    ) -> Result<Interaction, AgoraError> {
        if from == to {
            return Err(AgoraError::InvalidArgument(
                "Cannot send friend request to yourself".to_string(),
            ));
        }
        require_users(users, from, to)?;

        let already_friends = self.entry(from).is_some_and(|e| e.friends.contains(to))
            || self.entry(to).is_some_and(|e| e.friends.contains(from));
        if already_friends {
            return Err(AgoraError::Conflict("Users are already friends".to_string()));
        }
        if self.entry(to).is_some_and(|e| e.has_request_from(from)) {
            return Err(AgoraError::Conflict("Friend request already sent".to_string()));
        }

        self.entry_mut(from);
        self.entry_mut(to).requests.push(FriendRequest {
            from: from.to_string(),
            to: to.to_string(),
            date,
        });

        Ok(Interaction::new(NotificationKind::FriendRequest, from, to))
    }

    /// `to` accepts the pending request sent by `from`.
    pub fn accept_friend_request(&mut self, from: &str, to: &str) -> Result<Interaction, AgoraError> {
        let recipient = self
            .entries
            .get_mut(to)
            .ok_or_else(request_not_found)?;
        let index = recipient
            .requests
            .iter()
            .position(|r| r.from == from)
            .ok_or_else(request_not_found)?;

        recipient.requests.remove(index);
        recipient.friends.insert(from.to_string());
        self.entry_mut(from).friends.insert(to.to_string());

        Ok(Interaction::new(NotificationKind::FriendAccept, to, from))
    }

    // =========================================================================
    // FOLLOW
    // =========================================================================

    pub fn follow(
        &mut self,
        users: &[User],
        follower: &str,
        followed: &str,
    ) -> Result<Interaction, AgoraError> {
        if follower == followed {
            return Err(AgoraError::InvalidArgument("Cannot follow yourself".to_string()));
        }
        require_users(users, follower, followed)?;

        if self
            .entry(follower)
            .is_some_and(|e| e.following.contains(followed))
        {
            return Err(AgoraError::Conflict("Already following this user".to_string()));
        }

        self.entry_mut(follower).following.insert(followed.to_string());
        self.entry_mut(followed).followers.insert(follower.to_string());

        Ok(Interaction::new(NotificationKind::Follow, follower, followed))
    }

    pub fn unfollow(&mut self, follower: &str, followed: &str) -> Result<(), AgoraError> {
        if !self.entries.contains_key(follower) || !self.entries.contains_key(followed) {
            return Err(AgoraError::NotFound("User data not found".to_string()));
        }

        let removed = self
            .entries
            .get_mut(follower)
            .is_some_and(|e| e.following.remove(followed));
        if !removed {
            return Err(AgoraError::Conflict("Not following this user".to_string()));
        }
        if let Some(entry) = self.entries.get_mut(followed) {
            entry.followers.remove(follower);
        }
        Ok(())
    }

    // =========================================================================
    // CONSISTENCY
    // =========================================================================

    /// Describe every broken symmetry in the graph. Empty when consistent.
    pub fn violations(&self) -> Vec<String> {
        let mut found = Vec::new();
        for (name, entry) in &self.entries {
            for friend in &entry.friends {
                if !self.entry(friend).is_some_and(|e| e.friends.contains(name)) {
                    found.push(format!("{} lists {} as friend without reciprocation", name, friend));
                }
            }
            for followed in &entry.following {
                if !self.entry(followed).is_some_and(|e| e.followers.contains(name)) {
                    found.push(format!("{} follows {} but is not among its followers", name, followed));
                }
            }
            for follower in &entry.followers {
                if !self.entry(follower).is_some_and(|e| e.following.contains(name)) {
                    found.push(format!("{} lists follower {} who does not follow it", name, follower));
                }
            }
            for request in &entry.requests {
                if request.to != *name {
                    found.push(format!("request from {} stored on {} is addressed to {}", request.from, name, request.to));
                }
            }
        }
        found
    }
}

fn require_users(users: &[User], a: &str, b: &str) -> Result<(), AgoraError> {
    if !user::exists(users, a) || !user::exists(users, b) {
        return Err(AgoraError::NotFound("User not found".to_string()));
    }
    Ok(())
}

fn request_not_found() -> AgoraError {
    AgoraError::NotFound("Friend request not found".to_string())
}

// =============================================================================
// TESTS
// =============================================================================
