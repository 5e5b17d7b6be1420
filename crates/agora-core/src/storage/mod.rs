//! # Document Storage
//!
//! Whole-collection persistence. A store maps a collection name to the bytes
//! of one JSON array and supports only two primitives: read the whole
//! collection and overwrite the whole collection.
//!
//! Backends:
//! - `MemoryStore`: volatile, used by tests and `--backend memory`
//! - `JsonDirStore`: one `<collection>.json` file per collection
//! - `RedbStore`: one redb table, every commit is a single ACID transaction

pub mod json_dir;
pub mod redb_store;

pub use json_dir::JsonDirStore;
pub use redb_store::RedbStore;

use crate::AgoraError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

/// Bytes of a collection that was never written.
pub const EMPTY_COLLECTION: &[u8] = b"[]";

// =============================================================================
// COLLECTIONS
// =============================================================================

/// The four persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    Users,
    Posts,
    Notifications,
    SocialGraph,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Users,
        Collection::Posts,
        Collection::Notifications,
        Collection::SocialGraph,
    ];

    /// Stable name, also used as file stem and table key.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Posts => "posts",
            Self::Notifications => "notifications",
            Self::SocialGraph => "friends",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// STORE CONTRACT
// =============================================================================

/// Durable mapping from collection to the bytes of its JSON document.
pub trait DocumentStore: Send + Sync {
    /// Read a whole collection, creating it empty on first access.
    fn load(&self, collection: Collection) -> Result<Vec<u8>, AgoraError>;

    /// Overwrite a whole collection.
    fn save(&self, collection: Collection, bytes: &[u8]) -> Result<(), AgoraError>;

    /// Publish several collections written by one request.
    ///
    /// The default writes them in turn; backends that can do better override
    /// it with a single transaction.
    fn commit(&self, batch: &[(Collection, Vec<u8>)]) -> Result<(), AgoraError> {
        for (collection, bytes) in batch {
            self.save(*collection, bytes)?;
        }
        Ok(())
    }

    /// Short backend name for logs and `status`.
    fn backend_name(&self) -> &'static str;
}

/// Serialize a collection as pretty JSON.
pub fn encode<T: Serialize + ?Sized>(collection: Collection, value: &T) -> Result<Vec<u8>, AgoraError> {
    serde_json::to_vec_pretty(value).map_err(|e| {
        tracing::error!(%collection, error = %e, "failed to encode collection");
        AgoraError::Internal(format!("Failed to encode {}: {}", collection, e))
    })
}

/// Parse a collection document. Blank documents read as empty.
pub fn decode<T: DeserializeOwned>(collection: Collection, bytes: &[u8]) -> Result<T, AgoraError> {
    let bytes = if bytes.iter().all(u8::is_ascii_whitespace) {
        EMPTY_COLLECTION
    } else {
        bytes
    };
    serde_json::from_slice(bytes).map_err(|e| {
        tracing::error!(%collection, error = %e, "failed to decode collection");
        AgoraError::Internal(format!("Failed to decode {}: {}", collection, e))
    })
}

/// Convert a backend error into `Internal`, logging it first.
pub(crate) fn store_error(collection: Option<Collection>, context: &str, err: impl fmt::Display) -> AgoraError {
    match collection {
        Some(collection) => {
            tracing::error!(%collection, error = %err, "{}", context);
            AgoraError::Internal(format!("{} ({}): {}", context, collection, err))
        }
        None => {
            tracing::error!(error = %err, "{}", context);
            AgoraError::Internal(format!("{}: {}", context, err))
        }
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// Volatile store keeping every collection in a map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<BTreeMap<Collection, Vec<u8>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self, collection: Collection) -> Result<Vec<u8>, AgoraError> {
        let mut documents = self
            .documents
            .lock()
            .map_err(|e| store_error(Some(collection), "memory store lock poisoned", e))?;
        Ok(documents
            .entry(collection)
            .or_insert_with(|| EMPTY_COLLECTION.to_vec())
            .clone())
    }

    fn save(&self, collection: Collection, bytes: &[u8]) -> Result<(), AgoraError> {
        let mut documents = self
            .documents
            .lock()
            .map_err(|e| store_error(Some(collection), "memory store lock poisoned", e))?;
        documents.insert(collection, bytes.to_vec());
        Ok(())
    }

    fn commit(&self, batch: &[(Collection, Vec<u8>)]) -> Result<(), AgoraError> {
        let mut documents = self
            .documents
            .lock()
            .map_err(|e| store_error(None, "memory store lock poisoned", e))?;
        for (collection, bytes) in batch {
            documents.insert(*collection, bytes.clone());
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_names_are_stable() {
        assert_eq!(Collection::SocialGraph.name(), "friends");
        assert_eq!(Collection::from_name("posts"), Some(Collection::Posts));
        assert_eq!(Collection::from_name("nope"), None);
    }

    #[test]
    fn memory_store_starts_empty() {
        let store = MemoryStore::new();
        assert_eq!(store.load(Collection::Users).expect("load"), EMPTY_COLLECTION);
    }

    #[test]
    fn memory_store_commit_writes_all() {
        let store = MemoryStore::new();
        store
            .commit(&[
                (Collection::Posts, b"[1]".to_vec()),
                (Collection::Notifications, b"[2]".to_vec()),
            ])
            .expect("commit");
        assert_eq!(store.load(Collection::Posts).expect("posts"), b"[1]");
        assert_eq!(store.load(Collection::Notifications).expect("notifications"), b"[2]");
    }

    #[test]
    fn blank_document_decodes_as_empty() {
        let users: Vec<crate::User> = decode(Collection::Users, b"  \n").expect("decode");
        assert!(users.is_empty());
    }

    #[test]
    fn malformed_document_is_internal() {
        let result: Result<Vec<crate::User>, _> = decode(Collection::Users, b"{oops");
        assert!(matches!(result, Err(AgoraError::Internal(_))));
    }
}
