//! # Core Type Definitions
//!
//! This module contains the types shared by every Agora module:
//! - Record identifiers (`PostId`, `CommentId`, `NotificationId`)
//! - The creation timestamp type (`Timestamp`)
//! - Error types (`AgoraError`)
//!
//! Identifiers are plain `u64` newtypes so they serialize as bare numbers and
//! order deterministically inside `BTreeMap`/`BTreeSet`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// RECORD IDENTIFIERS
// =============================================================================

/// Unique identifier of a post. Derived from creation time, strictly monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub u64);

/// Unique identifier of a comment or reply, anywhere in a post's thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub u64);

/// Unique identifier of a notification record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub u64);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Creation time of posts, requests and notifications (RFC 3339 on the wire).
pub type Timestamp = chrono::DateTime<chrono::Utc>;

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Agora core.
///
/// - Validation and lookup failures never leave a partial state change behind
/// - Store failures are logged where they happen and surface as `Internal`
/// - The core never panics; every failure is a value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgoraError {
    /// A required field is missing or malformed, or the action targets oneself.
    #[error("{0}")]
    InvalidArgument(String),

    /// The post, comment, user, request or notification does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The toggle is already in the requested state.
    #[error("{0}")]
    Conflict(String),

    /// The caller does not own the record it tries to delete.
    #[error("{0}")]
    Forbidden(String),

    /// The document store or another collaborator failed.
    #[error("{0}")]
    Internal(String),
}

impl AgoraError {
    /// Short machine-readable name of the error class.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Forbidden(_) => "forbidden",
            Self::Internal(_) => "internal",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
