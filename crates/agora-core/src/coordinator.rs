//! # Interaction Coordinator
//!
//! Every request that changes state runs through the coordinator:
//!
//! `Validate -> Locate -> Mutate -> Notify -> Commit`
//!
//! The coordinator owns the authoritative in-memory copy of the four
//! collections, each behind its own mutex. Locks are always taken in the
//! order users -> posts -> graph -> notifications. A request mutates private
//! copies of the collections it touches, fans out at most one notification,
//! commits every touched collection in one [`DocumentStore::commit`] call and
//! only then publishes the copies. A failed validation or a failed commit
//! therefore leaves memory and store exactly as they were.
//!
//! Media is handled around the commit: uploads are stored before it (and
//! released again if the request fails) and replaced or deleted files are
//! released after it, best-effort.

use crate::engine::{PostAction, PostEngine};
use crate::formats::Snapshot;
use crate::ids::IdGenerator;
use crate::media::{MediaFolder, MediaStore, MediaUpload};
use crate::notification::{self, Interaction, Notification};
use crate::post::{Post, PostDraft};
use crate::social::{GraphEntry, SocialGraph};
use crate::storage::{self, Collection, DocumentStore};
use crate::user::{self, Upsert, User, UserProfile};
use crate::{AgoraError, CommentId, NotificationId, PostId};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

// =============================================================================
// RESULT TYPES
// =============================================================================

/// Sizes of the persisted collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub users: usize,
    pub posts: usize,
    pub comments: usize,
    pub notifications: usize,
    pub graph_entries: usize,
}

impl Stats {
    pub fn of(
        users: &[User],
        posts: &[Post],
        notifications: &[Notification],
        graph: &SocialGraph,
    ) -> Self {
        Self {
            users: users.len(),
            posts: posts.len(),
            comments: posts.iter().map(|p| p.comments.len()).sum(),
            notifications: notifications.len(),
            graph_entries: graph.len(),
        }
    }
}

/// State of a post after an accepted action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub post: Post,
    /// Comment or reply created by the action.
    pub comment_id: Option<CommentId>,
    /// Notification fanned out by the action.
    pub notification: Option<Notification>,
}

/// A user's graph entry together with the user directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendsOverview {
    pub entry: GraphEntry,
    pub users: Vec<User>,
}

// =============================================================================
// COMMIT BATCH
// =============================================================================

/// Encoded collections waiting for one commit.
#[derive(Default)]
struct Batch {
    documents: Vec<(Collection, Vec<u8>)>,
}

impl Batch {
    fn stage<T: Serialize + ?Sized>(&mut self, collection: Collection, value: &T) -> Result<(), AgoraError> {
        self.documents.push((collection, storage::encode(collection, value)?));
        Ok(())
    }
}

// =============================================================================
// COORDINATOR
// =============================================================================

pub struct Coordinator {
    store: Arc<dyn DocumentStore>,
    media: Arc<dyn MediaStore>,
    ids: IdGenerator,
    users: Mutex<Vec<User>>,
    posts: Mutex<Vec<Post>>,
    graph: Mutex<SocialGraph>,
    notifications: Mutex<Vec<Notification>>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("backend", &self.store.backend_name())
            .field("last_id", &self.ids.last())
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Load all collections from `store` and resume id generation after the
    /// largest id found in them.
    pub fn open(store: Arc<dyn DocumentStore>, media: Arc<dyn MediaStore>) -> Result<Self, AgoraError> {
        let users: Vec<User> = storage::decode(Collection::Users, &store.load(Collection::Users)?)?;
        let posts: Vec<Post> = storage::decode(Collection::Posts, &store.load(Collection::Posts)?)?;
        let graph: SocialGraph =
            storage::decode(Collection::SocialGraph, &store.load(Collection::SocialGraph)?)?;
        let notifications: Vec<Notification> = storage::decode(
            Collection::Notifications,
            &store.load(Collection::Notifications)?,
        )?;

        let floor = highest_id(&posts, &notifications);
        let stats = Stats::of(&users, &posts, &notifications, &graph);
        tracing::info!(
            backend = store.backend_name(),
            users = stats.users,
            posts = stats.posts,
            notifications = stats.notifications,
            graph_entries = stats.graph_entries,
            "collections loaded"
        );

        Ok(Self {
            store,
            media,
            ids: IdGenerator::resume_after(floor),
            users: Mutex::new(users),
            posts: Mutex::new(posts),
            graph: Mutex::new(graph),
            notifications: Mutex::new(notifications),
        })
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    fn commit(&self, batch: Batch) -> Result<(), AgoraError> {
        if batch.documents.is_empty() {
            return Ok(());
        }
        self.store.commit(&batch.documents)?;
        tracing::debug!(
            collections = ?batch.documents.iter().map(|(c, _)| c.name()).collect::<Vec<_>>(),
            "committed"
        );
        Ok(())
    }

    /// Fan out `interaction` onto a copy of `current`.
    ///
    /// Returns `None` when no notification is produced, so the collection
    /// stays untouched.
    fn notify(
        &self,
        current: &[Notification],
        interaction: Option<&Interaction>,
    ) -> Option<(Vec<Notification>, Notification)> {
        let created = notification::fan_out(
            interaction?,
            self.ids.next_notification(),
            chrono::Utc::now(),
        )?;
        let mut next = current.to_vec();
        next.push(created.clone());
        Some((next, created))
    }

    fn release_media(&self, reference: &str) {
        if let Err(e) = self.media.release(reference) {
            tracing::warn!(%reference, error = %e, "failed to release media");
        }
    }

    fn store_upload(&self, folder: MediaFolder, upload: Option<&MediaUpload>) -> Result<Option<String>, AgoraError> {
        upload
            .map(|u| self.media.store(folder, &u.filename, &u.bytes))
            .transpose()
    }

    // =========================================================================
    // USERS
    // =========================================================================

    pub fn users(&self) -> Result<Vec<User>, AgoraError> {
        Ok(lock(&self.users, Collection::Users)?.clone())
    }

    /// Create or fully replace the user with the profile's email; a banner
    /// dropped by the replacement is released afterwards.
    pub fn upsert_user(&self, profile: UserProfile) -> Result<Upsert, AgoraError> {
        let mut users = lock(&self.users, Collection::Users)?;
        let mut next = users.clone();
        let (outcome, dropped) = user::upsert(&mut next, profile)?;

        let mut batch = Batch::default();
        batch.stage(Collection::Users, &next)?;
        self.commit(batch)?;

        *users = next;
        if let Some(banner) = dropped {
            self.release_media(&banner);
        }
        Ok(outcome)
    }

    /// Update bio and/or banner; the replaced banner is released afterwards.
    pub fn update_profile(
        &self,
        username: &str,
        bio: Option<String>,
        banner: Option<&MediaUpload>,
    ) -> Result<User, AgoraError> {
        require_username(username)?;
        let mut users = lock(&self.users, Collection::Users)?;
        if !user::exists(&users, username) {
            return Err(AgoraError::NotFound("User not found".to_string()));
        }

        let banner_url = self.store_upload(MediaFolder::Banners, banner)?;
        let mut next = users.clone();
        let result = user::update_profile(&mut next, username, bio, banner_url.clone())
            .and_then(|replaced| {
                let mut batch = Batch::default();
                batch.stage(Collection::Users, &next)?;
                self.commit(batch)?;
                Ok(replaced)
            });

        match result {
            Ok(replaced) => {
                *users = next;
                if let Some(old) = replaced {
                    self.release_media(&old);
                }
                users
                    .iter()
                    .find(|u| u.username == username)
                    .cloned()
                    .ok_or_else(|| AgoraError::NotFound("User not found".to_string()))
            }
            Err(e) => {
                if let Some(stored) = banner_url {
                    self.release_media(&stored);
                }
                Err(e)
            }
        }
    }

    // =========================================================================
    // POSTS
    // =========================================================================

    pub fn posts(&self) -> Result<Vec<Post>, AgoraError> {
        Ok(lock(&self.posts, Collection::Posts)?.clone())
    }

    pub fn find_post(&self, id: PostId) -> Result<Post, AgoraError> {
        lock(&self.posts, Collection::Posts)?
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| AgoraError::NotFound("Post not found".to_string()))
    }

    /// Create a post, storing its media first.
    pub fn create_post(&self, mut draft: PostDraft, media: Option<&MediaUpload>) -> Result<Post, AgoraError> {
        if draft.username.trim().is_empty() {
            return Err(AgoraError::InvalidArgument("Username is required".to_string()));
        }

        let mut posts = lock(&self.posts, Collection::Posts)?;
        let stored = self.store_upload(MediaFolder::Posts, media)?;
        if stored.is_some() {
            draft.media = stored.clone();
        }

        let mut next = posts.clone();
        let result = PostEngine::create(&mut next, draft, &self.ids, chrono::Utc::now())
            .and_then(|id| {
                let mut batch = Batch::default();
                batch.stage(Collection::Posts, &next)?;
                self.commit(batch)?;
                Ok(id)
            });

        match result {
            Ok(id) => {
                *posts = next;
                tracing::info!(post = %id, "post created");
                posts
                    .iter()
                    .find(|p| p.id == id)
                    .cloned()
                    .ok_or_else(|| AgoraError::Internal("Created post vanished".to_string()))
            }
            Err(e) => {
                if let Some(reference) = stored {
                    self.release_media(&reference);
                }
                Err(e)
            }
        }
    }

    /// Delete a post owned by `username` and release its media.
    pub fn delete_post(&self, id: PostId, username: &str) -> Result<(), AgoraError> {
        require_username(username)?;
        let mut posts = lock(&self.posts, Collection::Posts)?;
        let mut next = posts.clone();
        let removed = PostEngine::delete(&mut next, id, username)?;

        let mut batch = Batch::default();
        batch.stage(Collection::Posts, &next)?;
        self.commit(batch)?;
        *posts = next;

        tracing::info!(post = %id, "post deleted");
        if let Some(reference) = removed.media.as_deref() {
            self.release_media(reference);
        }
        Ok(())
    }

    /// Apply a post action and fan out its notification.
    pub fn apply(&self, id: PostId, actor: &str, action: &PostAction) -> Result<ActionResult, AgoraError> {
        require_username(actor)?;
        let mut posts = lock(&self.posts, Collection::Posts)?;
        let mut notifications = lock(&self.notifications, Collection::Notifications)?;

        let mut next_posts = posts.clone();
        let outcome = PostEngine::apply(&mut next_posts, id, actor, action, &self.ids)?;
        let fanned = self.notify(&notifications, outcome.interaction.as_ref());

        let mut batch = Batch::default();
        batch.stage(Collection::Posts, &next_posts)?;
        if let Some((next_notifications, _)) = &fanned {
            batch.stage(Collection::Notifications, next_notifications)?;
        }
        self.commit(batch)?;

        *posts = next_posts;
        let notification = fanned.map(|(next_notifications, created)| {
            *notifications = next_notifications;
            created
        });
        tracing::debug!(post = %id, action = action.name(), notified = notification.is_some(), "post action applied");

        let post = posts
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| AgoraError::Internal("Updated post vanished".to_string()))?;
        Ok(ActionResult {
            post,
            comment_id: outcome.comment_id,
            notification,
        })
    }

    // =========================================================================
    // NOTIFICATIONS
    // =========================================================================

    /// Notifications addressed to `username`, newest first.
    pub fn notifications_for(&self, username: &str) -> Result<Vec<Notification>, AgoraError> {
        require_username(username)?;
        let notifications = lock(&self.notifications, Collection::Notifications)?;
        Ok(notification::inbox(&notifications, username))
    }

    pub fn delete_notification(&self, id: NotificationId, username: &str) -> Result<(), AgoraError> {
        require_username(username)?;
        let mut notifications = lock(&self.notifications, Collection::Notifications)?;
        let mut next = notifications.clone();
        notification::dismiss(&mut next, id, username)?;

        let mut batch = Batch::default();
        batch.stage(Collection::Notifications, &next)?;
        self.commit(batch)?;
        *notifications = next;
        Ok(())
    }

    /// Delete every notification addressed to `username`.
    pub fn clear_notifications(&self, username: &str) -> Result<usize, AgoraError> {
        require_username(username)?;
        let mut notifications = lock(&self.notifications, Collection::Notifications)?;
        let mut next = notifications.clone();
        let removed = notification::dismiss_all(&mut next, username);
        if removed == 0 {
            return Ok(0);
        }

        let mut batch = Batch::default();
        batch.stage(Collection::Notifications, &next)?;
        self.commit(batch)?;
        *notifications = next;
        Ok(removed)
    }

    // =========================================================================
    // SOCIAL GRAPH
    // =========================================================================

    /// Graph entry of `username` plus the user directory. Read-only.
    pub fn friends_overview(&self, username: &str) -> Result<FriendsOverview, AgoraError> {
        require_username(username)?;
        let users = lock(&self.users, Collection::Users)?;
        let graph = lock(&self.graph, Collection::SocialGraph)?;
        Ok(FriendsOverview {
            entry: graph.overview(username),
            users: users.clone(),
        })
    }

    pub fn send_friend_request(&self, from: &str, to: &str) -> Result<Option<Notification>, AgoraError> {
        require_pair(from, to, "Sender and recipient usernames are required")?;
        let users = lock(&self.users, Collection::Users)?;
        self.graph_mutation(|graph| {
            graph.send_friend_request(&users, from, to, chrono::Utc::now()).map(Some)
        })
    }

    pub fn accept_friend_request(&self, from: &str, to: &str) -> Result<Option<Notification>, AgoraError> {
        require_pair(from, to, "Sender and recipient usernames are required")?;
        self.graph_mutation(|graph| graph.accept_friend_request(from, to).map(Some))
    }

    pub fn follow(&self, follower: &str, followed: &str) -> Result<Option<Notification>, AgoraError> {
        require_pair(follower, followed, "Follower and followed usernames are required")?;
        let users = lock(&self.users, Collection::Users)?;
        self.graph_mutation(|graph| graph.follow(&users, follower, followed).map(Some))
    }

    pub fn unfollow(&self, follower: &str, followed: &str) -> Result<(), AgoraError> {
        require_pair(follower, followed, "Follower and followed usernames are required")?;
        self.graph_mutation(|graph| graph.unfollow(follower, followed).map(|()| None))
            .map(|_| ())
    }

    /// Run one graph mutation on a copy, fan out, commit, publish.
    fn graph_mutation<F>(&self, mutate: F) -> Result<Option<Notification>, AgoraError>
    where
        F: FnOnce(&mut SocialGraph) -> Result<Option<Interaction>, AgoraError>,
    {
        let mut graph = lock(&self.graph, Collection::SocialGraph)?;
        let mut notifications = lock(&self.notifications, Collection::Notifications)?;

        let mut next_graph = graph.clone();
        let interaction = mutate(&mut next_graph)?;
        let fanned = self.notify(&notifications, interaction.as_ref());

        let mut batch = Batch::default();
        batch.stage(Collection::SocialGraph, &next_graph)?;
        if let Some((next_notifications, _)) = &fanned {
            batch.stage(Collection::Notifications, next_notifications)?;
        }
        self.commit(batch)?;

        *graph = next_graph;
        Ok(fanned.map(|(next_notifications, created)| {
            *notifications = next_notifications;
            created
        }))
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    pub fn stats(&self) -> Result<Stats, AgoraError> {
        let users = lock(&self.users, Collection::Users)?;
        let posts = lock(&self.posts, Collection::Posts)?;
        let graph = lock(&self.graph, Collection::SocialGraph)?;
        let notifications = lock(&self.notifications, Collection::Notifications)?;
        Ok(Stats::of(&users, &posts, &notifications, &graph))
    }

    /// Snapshot of the in-memory state, encoded as the store would hold it.
    pub fn snapshot(&self) -> Result<Snapshot, AgoraError> {
        let users = lock(&self.users, Collection::Users)?;
        let posts = lock(&self.posts, Collection::Posts)?;
        let graph = lock(&self.graph, Collection::SocialGraph)?;
        let notifications = lock(&self.notifications, Collection::Notifications)?;
        Ok(Snapshot::from_documents([
            (Collection::Users, storage::encode(Collection::Users, &*users)?),
            (Collection::Posts, storage::encode(Collection::Posts, &*posts)?),
            (Collection::SocialGraph, storage::encode(Collection::SocialGraph, &*graph)?),
            (
                Collection::Notifications,
                storage::encode(Collection::Notifications, &*notifications)?,
            ),
        ]))
    }
}

fn lock<T>(mutex: &Mutex<T>, collection: Collection) -> Result<MutexGuard<'_, T>, AgoraError> {
    mutex.lock().map_err(|_| {
        tracing::error!(%collection, "collection lock poisoned");
        AgoraError::Internal(format!("{} collection is unavailable", collection))
    })
}

fn require_username(username: &str) -> Result<(), AgoraError> {
    if username.trim().is_empty() {
        return Err(AgoraError::InvalidArgument("Username is required".to_string()));
    }
    Ok(())
}

fn require_pair(first: &str, second: &str, message: &str) -> Result<(), AgoraError> {
    if first.trim().is_empty() || second.trim().is_empty() {
        return Err(AgoraError::InvalidArgument(message.to_string()));
    }
    Ok(())
}

/// Largest post, comment or notification id in the loaded collections.
fn highest_id(posts: &[Post], notifications: &[Notification]) -> u64 {
    let posts_max = posts
        .iter()
        .flat_map(|p| {
            std::iter::once(p.id.0).chain(p.comments.depth_first().map(|(_, c)| c.id.0))
        })
        .max()
        .unwrap_or(0);
    let notifications_max = notifications.iter().map(|n| n.id.0).max().unwrap_or(0);
    posts_max.max(notifications_max)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::DiskMedia;
    use crate::notification::NotificationKind;
    use crate::storage::MemoryStore;

    fn coordinator() -> (Coordinator, Arc<MemoryStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        let coordinator = Coordinator::open(store.clone(), Arc::new(DiskMedia::new(dir.path())))
            .expect("open");
        for name in ["alice", "bob"] {
            coordinator
                .upsert_user(UserProfile {
                    username: name.to_string(),
                    user_email: format!("{}@agora.test", name),
                    photo_url: None,
                })
                .expect("user");
        }
        (coordinator, store, dir)
    }

    fn draft(owner: &str, caption: &str) -> PostDraft {
        PostDraft {
            username: owner.to_string(),
            caption: caption.to_string(),
            ..PostDraft::default()
        }
    }

    #[test]
    fn like_commits_post_and_notification_together() {
        let (coordinator, store, _dir) = coordinator();
        let post = coordinator.create_post(draft("alice", "hello"), None).expect("create");

        let result = coordinator.apply(post.id, "bob", &PostAction::Like).expect("like");
        let notification = result.notification.expect("notification");
        assert_eq!(notification.kind, NotificationKind::Like);
        assert_eq!(result.post.likes(), 1);

        let stored: Vec<Notification> =
            storage::decode(Collection::Notifications, &store.load(Collection::Notifications).expect("load"))
                .expect("decode");
        assert_eq!(stored, vec![notification]);
    }

    #[test]
    fn self_like_does_not_touch_notifications() {
        let (coordinator, _store, _dir) = coordinator();
        let post = coordinator.create_post(draft("alice", "hello"), None).expect("create");
        let result = coordinator.apply(post.id, "alice", &PostAction::Like).expect("like");
        assert!(result.notification.is_none());
        assert!(coordinator.notifications_for("alice").expect("inbox").is_empty());
    }

    #[test]
    fn reopen_resumes_ids_after_existing_ones() {
        let (coordinator, store, dir) = coordinator();
        let post = coordinator.create_post(draft("alice", "hello"), None).expect("create");
        drop(coordinator);

        let reopened = Coordinator::open(store, Arc::new(DiskMedia::new(dir.path()))).expect("reopen");
        let second = reopened.create_post(draft("bob", "again"), None).expect("create");
        assert!(second.id > post.id);
        assert_eq!(reopened.stats().expect("stats").posts, 2);
    }

    #[test]
    fn graph_operations_notify() {
        let (coordinator, _store, _dir) = coordinator();
        let sent = coordinator.send_friend_request("alice", "bob").expect("send");
        assert_eq!(sent.map(|n| n.recipient), Some("bob".to_string()));

        coordinator.accept_friend_request("alice", "bob").expect("accept");
        let inbox = coordinator.notifications_for("alice").expect("inbox");
        assert_eq!(inbox[0].message, "accepted your friend request");

        let overview = coordinator.friends_overview("alice").expect("overview");
        assert!(overview.entry.friends.contains("bob"));
        assert_eq!(overview.users.len(), 2);
    }

    #[test]
    fn blank_username_inbox_is_invalid() {
        let (coordinator, _store, _dir) = coordinator();
        assert!(matches!(
            coordinator.notifications_for(" "),
            Err(AgoraError::InvalidArgument(_))
        ));
    }

    #[test]
    fn blank_usernames_are_rejected_before_lookup() {
        let (coordinator, store, _dir) = coordinator();
        let post = coordinator.create_post(draft("alice", "hello"), None).expect("create");
        let before = coordinator.snapshot().expect("snapshot");
        let stored_posts = store.load(Collection::Posts).expect("load");

        let results = [
            coordinator.follow("", "bob").map(|_| ()),
            coordinator.follow("alice", " ").map(|_| ()),
            coordinator.unfollow("", "bob"),
            coordinator.send_friend_request("", "bob").map(|_| ()),
            coordinator.accept_friend_request("alice", "").map(|_| ()),
            coordinator.delete_post(post.id, ""),
            coordinator.update_profile("", Some("bio".to_string()), None).map(|_| ()),
            coordinator.apply(post.id, "", &PostAction::Like).map(|_| ()),
        ];
        for result in results {
            assert!(matches!(result, Err(AgoraError::InvalidArgument(_))), "{:?}", result);
        }

        assert_eq!(coordinator.snapshot().expect("snapshot"), before);
        assert_eq!(store.load(Collection::Posts).expect("load"), stored_posts);
    }

    #[test]
    fn snapshot_matches_stats() {
        let (coordinator, _store, _dir) = coordinator();
        coordinator.create_post(draft("alice", "hello"), None).expect("create");
        let stats = coordinator.snapshot().and_then(|s| s.validate()).expect("snapshot");
        assert_eq!(stats, coordinator.stats().expect("stats"));
    }
}
