//! # Snapshot Format
//!
//! Binary export of all four collections, used by `agora export` and
//! `agora import`.
//!
//! Format: Header (5 bytes) + postcard-serialized document map.
//! - 4 bytes: Magic ("AGRA")
//! - 1 byte: Version
//!
//! The payload maps collection names to their JSON documents, so a snapshot
//! carries exactly the bytes a store would hold.
//!
//! ## Validation
//!
//! Size and header are checked before the payload is parsed, and every
//! document is decoded into its typed collection before a restore writes
//! anything to the target store.

use crate::coordinator::Stats;
use crate::notification::Notification;
use crate::post::Post;
use crate::social::SocialGraph;
use crate::storage::{self, Collection, DocumentStore, EMPTY_COLLECTION};
use crate::{AgoraError, User, primitives};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum accepted snapshot size, checked before deserialization.
pub const MAX_SNAPSHOT_SIZE: usize = 512 * 1024 * 1024;

/// Header length in bytes.
const HEADER_LEN: usize = 5;

// =============================================================================
// HEADER
// =============================================================================

/// The snapshot header precedes the payload.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), AgoraError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(AgoraError::InvalidArgument(
                "Invalid snapshot magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(AgoraError::InvalidArgument(format!(
                "Unsupported snapshot version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AgoraError> {
        if bytes.len() < HEADER_LEN {
            return Err(AgoraError::InvalidArgument(
                "Snapshot too short: header missing".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// The JSON documents of every collection, keyed by collection name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    documents: BTreeMap<String, Vec<u8>>,
}

impl Snapshot {
    /// Build a snapshot from already-encoded documents.
    pub fn from_documents(documents: impl IntoIterator<Item = (Collection, Vec<u8>)>) -> Self {
        Self {
            documents: documents
                .into_iter()
                .map(|(c, bytes)| (c.name().to_string(), bytes))
                .collect(),
        }
    }

    /// Read every collection from `store`.
    pub fn capture(store: &dyn DocumentStore) -> Result<Self, AgoraError> {
        let mut documents = Vec::with_capacity(Collection::ALL.len());
        for collection in Collection::ALL {
            documents.push((collection, store.load(collection)?));
        }
        Ok(Self::from_documents(documents))
    }

    /// The document of `collection`; a missing one reads as empty.
    pub fn document(&self, collection: Collection) -> &[u8] {
        self.documents
            .get(collection.name())
            .map_or(EMPTY_COLLECTION, Vec::as_slice)
    }

    /// Decode every document, returning the collection sizes.
    pub fn validate(&self) -> Result<Stats, AgoraError> {
        if let Some(unknown) = self
            .documents
            .keys()
            .find(|name| Collection::from_name(name).is_none())
        {
            return Err(AgoraError::InvalidArgument(format!(
                "Unknown collection in snapshot: {}",
                unknown
            )));
        }

        let users: Vec<User> = storage::decode(Collection::Users, self.document(Collection::Users))?;
        let posts: Vec<Post> = storage::decode(Collection::Posts, self.document(Collection::Posts))?;
        let notifications: Vec<Notification> = storage::decode(
            Collection::Notifications,
            self.document(Collection::Notifications),
        )?;
        let graph: SocialGraph = storage::decode(
            Collection::SocialGraph,
            self.document(Collection::SocialGraph),
        )?;

        Ok(Stats::of(&users, &posts, &notifications, &graph))
    }

    /// Validate, then overwrite every collection of `store` in one commit.
    pub fn restore(&self, store: &dyn DocumentStore) -> Result<Stats, AgoraError> {
        let stats = self.validate()?;
        let batch: Vec<(Collection, Vec<u8>)> = Collection::ALL
            .into_iter()
            .map(|c| (c, self.document(c).to_vec()))
            .collect();
        store.commit(&batch)?;
        Ok(stats)
    }

    /// Serialize to bytes (header + payload).
    pub fn to_bytes(&self) -> Result<Vec<u8>, AgoraError> {
        let payload = postcard::to_stdvec(self)
            .map_err(|e| AgoraError::Internal(format!("Failed to encode snapshot: {}", e)))?;

        let mut result = Vec::with_capacity(HEADER_LEN + payload.len());
        result.extend_from_slice(&SnapshotHeader::new().to_bytes());
        result.extend_from_slice(&payload);
        Ok(result)
    }

    /// Parse bytes produced by [`Snapshot::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AgoraError> {
        if bytes.len() > MAX_SNAPSHOT_SIZE {
            return Err(AgoraError::InvalidArgument(format!(
                "Snapshot size {} bytes exceeds maximum allowed {} bytes",
                bytes.len(),
                MAX_SNAPSHOT_SIZE
            )));
        }

        let header = SnapshotHeader::from_bytes(bytes)?;
        header.validate()?;

        postcard::from_bytes(&bytes[HEADER_LEN..]).map_err(|e| {
            AgoraError::InvalidArgument(format!("Failed to decode snapshot payload: {}", e))
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn populated_store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .save(
                Collection::Users,
                br#"[{"username":"alice","userEmail":"a@agora.test"}]"#,
            )
            .expect("save users");
        store
            .save(Collection::SocialGraph, br#"[{"username":"alice"}]"#)
            .expect("save graph");
        store
    }

    #[test]
    fn header_has_magic_and_version() {
        let bytes = Snapshot::default().to_bytes().expect("encode");
        assert_eq!(&bytes[0..4], primitives::MAGIC_BYTES);
        assert_eq!(bytes[4], primitives::FORMAT_VERSION);
    }

    #[test]
    fn capture_restore_into_fresh_store() {
        let source = populated_store();
        let bytes = Snapshot::capture(&source)
            .and_then(|s| s.to_bytes())
            .expect("capture");

        let target = MemoryStore::new();
        let stats = Snapshot::from_bytes(&bytes)
            .and_then(|s| s.restore(&target))
            .expect("restore");

        assert_eq!(stats.users, 1);
        assert_eq!(stats.graph_entries, 1);
        assert_eq!(
            target.load(Collection::Users).expect("load"),
            source.load(Collection::Users).expect("load")
        );
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = Snapshot::default().to_bytes().expect("encode");
        bytes[0] = b'X';
        assert!(matches!(
            Snapshot::from_bytes(&bytes),
            Err(AgoraError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(Snapshot::from_bytes(b"AGR").is_err());
    }

    #[test]
    fn invalid_document_blocks_restore() {
        let snapshot = Snapshot::from_documents([(Collection::Posts, b"{not json".to_vec())]);
        let target = MemoryStore::new();
        assert!(snapshot.restore(&target).is_err());
        assert_eq!(target.load(Collection::Posts).expect("load"), EMPTY_COLLECTION);
    }
}
