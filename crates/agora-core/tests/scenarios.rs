//! # End-to-End Scenarios
//!
//! Drives the `Coordinator` through complete user stories against the
//! in-memory, JSON-directory and redb stores.

use agora_core::storage::{self, Collection, EMPTY_COLLECTION};
use agora_core::{
    AgoraError, Coordinator, DiskMedia, DocumentStore, JsonDirStore, MediaUpload, MemoryStore,
    Notification, NotificationKind, PostAction, PostDraft, Post, RedbStore, UserProfile,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3];

fn open(store: Arc<dyn DocumentStore>, media_dir: &TempDir) -> Coordinator {
    Coordinator::open(store, Arc::new(DiskMedia::new(media_dir.path()))).expect("open")
}

fn register(coordinator: &Coordinator, names: &[&str]) {
    for name in names {
        coordinator
            .upsert_user(UserProfile {
                username: name.to_string(),
                user_email: format!("{}@agora.test", name),
                photo_url: None,
            })
            .expect("register");
    }
}

fn draft(owner: &str, caption: &str) -> PostDraft {
    PostDraft {
        username: owner.to_string(),
        caption: caption.to_string(),
        ..PostDraft::default()
    }
}

// =============================================================================
// STORIES
// =============================================================================

#[test]
fn bob_likes_alices_post() {
    let media = tempfile::tempdir().expect("tempdir");
    let coordinator = open(Arc::new(MemoryStore::new()), &media);
    register(&coordinator, &["alice", "bob"]);

    let post = coordinator.create_post(draft("alice", "hello"), None).expect("create");
    coordinator.apply(post.id, "bob", &PostAction::Like).expect("like");

    let stored = coordinator.find_post(post.id).expect("find");
    assert_eq!(stored.likes(), 1);
    assert!(stored.liked_by().contains("bob"));

    let inbox = coordinator.notifications_for("alice").expect("inbox");
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::Like);
    assert_eq!(inbox[0].actor, "bob");
    assert_eq!(inbox[0].message, "liked your post: \"hello\"");
    assert_eq!(inbox[0].post_id, Some(post.id));

    let again = coordinator.apply(post.id, "bob", &PostAction::Like);
    assert!(matches!(again, Err(AgoraError::Conflict(_))));
    assert_eq!(coordinator.notifications_for("alice").expect("inbox").len(), 1);
}

#[test]
fn friend_request_and_accept() {
    let media = tempfile::tempdir().expect("tempdir");
    let coordinator = open(Arc::new(MemoryStore::new()), &media);
    register(&coordinator, &["alice", "bob"]);

    coordinator.send_friend_request("alice", "bob").expect("send");
    let bob_inbox = coordinator.notifications_for("bob").expect("inbox");
    assert_eq!(bob_inbox[0].kind, NotificationKind::FriendRequest);
    assert_eq!(bob_inbox[0].message, "sent you a friend request");

    coordinator.accept_friend_request("alice", "bob").expect("accept");
    let alice = coordinator.friends_overview("alice").expect("alice");
    let bob = coordinator.friends_overview("bob").expect("bob");
    assert!(alice.entry.friends.contains("bob"));
    assert!(bob.entry.friends.contains("alice"));
    assert!(bob.entry.requests.is_empty());

    let alice_inbox = coordinator.notifications_for("alice").expect("inbox");
    assert_eq!(alice_inbox[0].kind, NotificationKind::FriendAccept);
    assert_eq!(alice_inbox[0].actor, "bob");
}

#[test]
fn long_reply_is_truncated_in_notification() {
    let media = tempfile::tempdir().expect("tempdir");
    let coordinator = open(Arc::new(MemoryStore::new()), &media);
    register(&coordinator, &["alice", "bob", "carol"]);

    let post = coordinator.create_post(draft("alice", "thread"), None).expect("create");
    let comment = coordinator
        .apply(post.id, "bob", &PostAction::Comment { text: "first".to_string() })
        .expect("comment")
        .comment_id
        .expect("comment id");

    let text = "r".repeat(60);
    coordinator
        .apply(post.id, "carol", &PostAction::Reply { parent: comment, text })
        .expect("reply");

    let inbox = coordinator.notifications_for("bob").expect("inbox");
    assert_eq!(inbox[0].kind, NotificationKind::CommentReply);
    assert_eq!(
        inbox[0].message,
        format!("replied to your comment: \"{}...\"", "r".repeat(50))
    );
}

#[test]
fn deep_reply_is_discoverable_and_likable() {
    let media = tempfile::tempdir().expect("tempdir");
    let coordinator = open(Arc::new(MemoryStore::new()), &media);
    register(&coordinator, &["alice", "bob", "carol"]);

    let post = coordinator.create_post(draft("alice", "deep"), None).expect("create");
    let mut parent = coordinator
        .apply(post.id, "bob", &PostAction::Comment { text: "0".to_string() })
        .expect("comment")
        .comment_id
        .expect("id");
    for depth in 1..200 {
        parent = coordinator
            .apply(
                post.id,
                "bob",
                &PostAction::Reply {
                    parent,
                    text: depth.to_string(),
                },
            )
            .expect("reply")
            .comment_id
            .expect("id");
    }

    let liked = coordinator
        .apply(post.id, "carol", &PostAction::LikeComment(parent))
        .expect("like deepest");
    assert_eq!(liked.post.comments.depth_of(parent), Some(199));
    let notification = liked.notification.expect("notification");
    assert_eq!(notification.kind, NotificationKind::CommentLike);
    assert_eq!(notification.recipient, "bob");
    assert_eq!(notification.message, "liked your comment: \"199\"");
}

#[test]
fn self_interactions_never_notify() {
    let media = tempfile::tempdir().expect("tempdir");
    let coordinator = open(Arc::new(MemoryStore::new()), &media);
    register(&coordinator, &["alice"]);

    let post = coordinator.create_post(draft("alice", "mine"), None).expect("create");
    coordinator.apply(post.id, "alice", &PostAction::Like).expect("like");
    let comment = coordinator
        .apply(post.id, "alice", &PostAction::Comment { text: "me".to_string() })
        .expect("comment")
        .comment_id
        .expect("id");
    coordinator
        .apply(post.id, "alice", &PostAction::LikeComment(comment))
        .expect("like comment");

    assert!(coordinator.notifications_for("alice").expect("inbox").is_empty());
    assert!(matches!(
        coordinator.follow("alice", "alice"),
        Err(AgoraError::InvalidArgument(_))
    ));
    assert!(matches!(
        coordinator.send_friend_request("alice", "alice"),
        Err(AgoraError::InvalidArgument(_))
    ));
}

#[test]
fn notification_housekeeping() {
    let media = tempfile::tempdir().expect("tempdir");
    let coordinator = open(Arc::new(MemoryStore::new()), &media);
    register(&coordinator, &["alice", "bob", "carol"]);

    coordinator.follow("bob", "alice").expect("follow");
    coordinator.follow("carol", "alice").expect("follow");
    let inbox = coordinator.notifications_for("alice").expect("inbox");
    assert_eq!(inbox.len(), 2);

    assert!(matches!(
        coordinator.delete_notification(inbox[0].id, "bob"),
        Err(AgoraError::Forbidden(_))
    ));
    coordinator
        .delete_notification(inbox[0].id, "alice")
        .expect("delete");
    assert_eq!(coordinator.clear_notifications("alice").expect("clear"), 1);
    assert!(coordinator.notifications_for("alice").expect("inbox").is_empty());
}

#[test]
fn deleting_a_post_releases_its_media() {
    let media = tempfile::tempdir().expect("tempdir");
    let coordinator = open(Arc::new(MemoryStore::new()), &media);
    register(&coordinator, &["alice", "bob"]);

    let upload = MediaUpload {
        filename: "pic.png".to_string(),
        bytes: PNG.to_vec(),
    };
    let post = coordinator
        .create_post(draft("alice", "look"), Some(&upload))
        .expect("create");
    let reference = post.media.clone().expect("media");
    assert_eq!(post.media_type(), Some("image"));

    let file = media
        .path()
        .join(reference.trim_start_matches("/uploads/"));
    assert!(file.exists());

    assert!(matches!(
        coordinator.delete_post(post.id, "bob"),
        Err(AgoraError::Forbidden(_))
    ));
    coordinator.delete_post(post.id, "alice").expect("delete");
    assert!(!file.exists());
    assert!(matches!(
        coordinator.find_post(post.id),
        Err(AgoraError::NotFound(_))
    ));
}

#[test]
fn banner_update_replaces_old_file() {
    let media = tempfile::tempdir().expect("tempdir");
    let coordinator = open(Arc::new(MemoryStore::new()), &media);
    register(&coordinator, &["alice"]);

    let banner = MediaUpload {
        filename: "b.png".to_string(),
        bytes: PNG.to_vec(),
    };
    let first = coordinator
        .update_profile("alice", Some("hi there".to_string()), Some(&banner))
        .expect("first");
    let first_banner = first.banner_url.clone().expect("banner");
    assert!(first_banner.starts_with("/uploads/banners/"));

    let second = coordinator
        .update_profile("alice", None, Some(&banner))
        .expect("second");
    assert_eq!(second.bio.as_deref(), Some("hi there"));
    assert_ne!(second.banner_url, first.banner_url);

    let old_file = media
        .path()
        .join(first_banner.trim_start_matches("/uploads/"));
    assert!(!old_file.exists());
}

#[test]
fn relogin_upsert_resets_profile_and_releases_banner() {
    let media = tempfile::tempdir().expect("tempdir");
    let coordinator = open(Arc::new(MemoryStore::new()), &media);
    register(&coordinator, &["alice"]);

    let banner = MediaUpload {
        filename: "b.png".to_string(),
        bytes: PNG.to_vec(),
    };
    let updated = coordinator
        .update_profile("alice", Some("hi there".to_string()), Some(&banner))
        .expect("update");
    let banner_url = updated.banner_url.expect("banner");

    register(&coordinator, &["alice"]);

    let users = coordinator.users().expect("users");
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].bio, None);
    assert_eq!(users[0].banner_url, None);
    let old_file = media.path().join(banner_url.trim_start_matches("/uploads/"));
    assert!(!old_file.exists());
}

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Store that accepts loads but fails every commit once armed.
#[derive(Default)]
struct FailingStore {
    inner: MemoryStore,
    armed: AtomicBool,
}

impl DocumentStore for FailingStore {
    fn load(&self, collection: Collection) -> Result<Vec<u8>, AgoraError> {
        self.inner.load(collection)
    }

    fn save(&self, collection: Collection, bytes: &[u8]) -> Result<(), AgoraError> {
        if self.armed.load(Ordering::SeqCst) {
            return Err(AgoraError::Internal("disk full".to_string()));
        }
        self.inner.save(collection, bytes)
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

#[test]
fn failed_commit_leaves_no_trace() {
    let media = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(FailingStore::default());
    let coordinator = open(store.clone(), &media);
    register(&coordinator, &["alice", "bob"]);
    let post = coordinator.create_post(draft("alice", "hello"), None).expect("create");

    store.armed.store(true, Ordering::SeqCst);
    let result = coordinator.apply(post.id, "bob", &PostAction::Like);
    assert!(matches!(result, Err(AgoraError::Internal(_))));

    assert_eq!(coordinator.find_post(post.id).expect("find").likes(), 0);
    assert!(coordinator.notifications_for("alice").expect("inbox").is_empty());
    assert!(matches!(
        coordinator.follow("bob", "alice"),
        Err(AgoraError::Internal(_))
    ));
    assert!(coordinator.friends_overview("bob").expect("overview").entry.following.is_empty());

    store.armed.store(false, Ordering::SeqCst);
    coordinator.apply(post.id, "bob", &PostAction::Like).expect("retry");
    assert_eq!(coordinator.notifications_for("alice").expect("inbox").len(), 1);
}

#[test]
fn json_directory_survives_restart() {
    let data = tempfile::tempdir().expect("tempdir");
    let media = tempfile::tempdir().expect("tempdir");

    let post_id = {
        let store = Arc::new(JsonDirStore::open(data.path()).expect("open store"));
        let coordinator = open(store, &media);
        register(&coordinator, &["alice", "bob"]);
        let post = coordinator.create_post(draft("alice", "persist"), None).expect("create");
        coordinator
            .apply(post.id, "bob", &PostAction::Comment { text: "kept".to_string() })
            .expect("comment");
        post.id
    };

    let store = Arc::new(JsonDirStore::open(data.path()).expect("reopen store"));
    let raw = store.load(Collection::Posts).expect("raw");
    let posts: Vec<Post> = storage::decode(Collection::Posts, &raw).expect("decode");
    assert_eq!(posts[0].comments.len(), 1);

    let coordinator = open(store, &media);
    let post = coordinator.find_post(post_id).expect("find");
    assert_eq!(post.comments.len(), 1);
    assert_eq!(coordinator.notifications_for("alice").expect("inbox").len(), 1);
}

#[test]
fn redb_commit_writes_post_and_notification() {
    let data = tempfile::tempdir().expect("tempdir");
    let media = tempfile::tempdir().expect("tempdir");
    let db_path = data.path().join("agora.redb");

    {
        let store = Arc::new(RedbStore::open(&db_path).expect("open db"));
        let coordinator = open(store, &media);
        register(&coordinator, &["alice", "bob"]);
        let post = coordinator.create_post(draft("alice", "redb"), None).expect("create");
        coordinator.apply(post.id, "bob", &PostAction::Like).expect("like");
    }

    let store = RedbStore::open(&db_path).expect("reopen db");
    let notifications: Vec<Notification> = storage::decode(
        Collection::Notifications,
        &store.load(Collection::Notifications).expect("load"),
    )
    .expect("decode");
    assert_eq!(notifications.len(), 1);
    assert_ne!(store.load(Collection::Posts).expect("posts"), EMPTY_COLLECTION);
}
