//! # agora-core
//!
//! The content-interaction and social-graph engine for Agora - THE LOGIC.
//!
//! This crate owns everything a social feed needs to stay consistent:
//! posts with their reaction sets, polls and nested comment threads, the
//! friend/follow graph, and the notifications fanned out of both.
//!
//! ## Architecture
//!
//! - `post`, `comment`, `poll`, `user`: the data model
//! - `engine` (`PostEngine`) and `social` (`SocialGraph`): state transitions
//! - `notification`: the single fan-out point for notifications
//! - `coordinator`: validate, mutate, notify, commit
//! - `storage`: the `DocumentStore` trait and its backends
//! - `media`, `formats`, `ids`: collaborators
//!
//! ## Architectural Constraints
//!
//! - Engines never touch the store; only the `Coordinator` commits
//! - Deterministic collections (BTreeMap/BTreeSet) for every set and index
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod comment;
pub mod coordinator;
pub mod engine;
pub mod formats;
pub mod ids;
pub mod media;
pub mod notification;
pub mod poll;
pub mod post;
pub mod primitives;
pub mod social;
pub mod storage;
pub mod types;
pub mod user;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{AgoraError, CommentId, NotificationId, PostId, Timestamp};

// =============================================================================
// RE-EXPORTS: Data Model
// =============================================================================

pub use comment::{Comment, CommentThread, NestedJson};
pub use notification::{Interaction, Notification, NotificationKind};
pub use poll::Poll;
pub use post::{Post, PostDraft};
pub use social::{FriendRequest, GraphEntry, SocialGraph};
pub use user::{Upsert, User, UserProfile};

// =============================================================================
// RE-EXPORTS: Engines
// =============================================================================

pub use coordinator::{ActionResult, Coordinator, FriendsOverview, Stats};
pub use engine::{PostAction, PostEngine, PostOutcome};
pub use ids::IdGenerator;

// =============================================================================
// RE-EXPORTS: Collaborators
// =============================================================================

pub use formats::{Snapshot, SnapshotHeader};
pub use media::{DiskMedia, MediaFolder, MediaStore, MediaUpload};
pub use storage::{Collection, DocumentStore, JsonDirStore, MemoryStore, RedbStore};
