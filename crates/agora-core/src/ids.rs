//! # Identifier Generation
//!
//! Record ids are derived from the wall clock in milliseconds but never
//! repeat: when two ids are requested within the same millisecond (or the
//! clock steps backwards) the generator hands out `last + 1` instead.

use crate::{CommentId, NotificationId, PostId};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide monotonic id source shared by posts, comments and notifications.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    /// Create a generator with no history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a generator whose next id is strictly greater than `floor`.
    ///
    /// Used after loading persisted collections so ids stay unique across
    /// restarts even if the clock went backwards in between.
    #[must_use]
    pub fn resume_after(floor: u64) -> Self {
        Self {
            last: AtomicU64::new(floor),
        }
    }

    /// Next raw id.
    pub fn next(&self) -> u64 {
        let now = now_millis();
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(current.saturating_add(1));
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn next_post(&self) -> PostId {
        PostId(self.next())
    }

    pub fn next_comment(&self) -> CommentId {
        CommentId(self.next())
    }

    pub fn next_notification(&self) -> NotificationId {
        NotificationId(self.next())
    }

    /// The most recently issued id (or the resume floor).
    #[must_use]
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

// =============================================================================
// TESTS
// =============================================================================
