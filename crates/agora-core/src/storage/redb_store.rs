//! # redb-backed Document Store
//!
//! All four collections live in one redb table keyed by collection name.
//! redb gives crash safety through copy-on-write B-trees, and a multi-
//! collection [`DocumentStore::commit`] lands in a single write transaction:
//! either every touched collection is replaced or none is.

use super::{Collection, DocumentStore, EMPTY_COLLECTION, store_error};
use crate::AgoraError;
use redb::{Database, ReadableDatabase, TableDefinition};
use std::path::Path;

/// Table for documents: collection name -> JSON bytes
const DOCUMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");

pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AgoraError> {
        let db = Database::create(path.as_ref())
            .map_err(|e| store_error(None, "failed to open redb database", e))?;

        // Initialize the table so read transactions always find it
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| store_error(None, "failed to begin transaction", e))?;
            let _ = write_txn
                .open_table(DOCUMENTS)
                .map_err(|e| store_error(None, "failed to open documents table", e))?;
            write_txn
                .commit()
                .map_err(|e| store_error(None, "failed to commit transaction", e))?;
        }

        Ok(Self { db })
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), AgoraError> {
        self.db
            .compact()
            .map_err(|e| store_error(None, "failed to compact database", e))?;
        Ok(())
    }

    fn read(&self, collection: Collection) -> Result<Option<Vec<u8>>, AgoraError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| store_error(Some(collection), "failed to begin read", e))?;
        let table = read_txn
            .open_table(DOCUMENTS)
            .map_err(|e| store_error(Some(collection), "failed to open documents table", e))?;
        let value = table
            .get(collection.name())
            .map_err(|e| store_error(Some(collection), "failed to read collection", e))?
            .map(|guard| guard.value().to_vec());
        Ok(value)
    }
}

impl DocumentStore for RedbStore {
    fn load(&self, collection: Collection) -> Result<Vec<u8>, AgoraError> {
        match self.read(collection)? {
            Some(bytes) => Ok(bytes),
            None => {
                self.save(collection, EMPTY_COLLECTION)?;
                Ok(EMPTY_COLLECTION.to_vec())
            }
        }
    }

    fn save(&self, collection: Collection, bytes: &[u8]) -> Result<(), AgoraError> {
        self.commit(&[(collection, bytes.to_vec())])
    }

    fn commit(&self, batch: &[(Collection, Vec<u8>)]) -> Result<(), AgoraError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| store_error(None, "failed to begin transaction", e))?;
        {
            let mut table = write_txn
                .open_table(DOCUMENTS)
                .map_err(|e| store_error(None, "failed to open documents table", e))?;
            for (collection, bytes) in batch {
                table
                    .insert(collection.name(), bytes.as_slice())
                    .map_err(|e| store_error(Some(*collection), "failed to write collection", e))?;
            }
        }
        write_txn
            .commit()
            .map_err(|e| store_error(None, "failed to commit transaction", e))?;

        tracing::debug!(collections = batch.len(), "redb commit");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redb"
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_collection_loads_empty() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("agora.redb")).expect("open db");
        assert_eq!(store.load(Collection::Posts).expect("load"), EMPTY_COLLECTION);
    }

    #[test]
    fn commit_survives_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("agora.redb");

        {
            let store = RedbStore::open(&db_path).expect("open db");
            store
                .commit(&[
                    (Collection::Posts, b"[\"p\"]".to_vec()),
                    (Collection::Notifications, b"[\"n\"]".to_vec()),
                ])
                .expect("commit");
        }

        let store = RedbStore::open(&db_path).expect("reopen db");
        assert_eq!(store.load(Collection::Posts).expect("posts"), b"[\"p\"]");
        assert_eq!(
            store.load(Collection::Notifications).expect("notifications"),
            b"[\"n\"]"
        );
    }

    #[test]
    fn compact_keeps_documents() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("agora.redb");
        let mut store = RedbStore::open(&db_path).expect("open db");
        store.save(Collection::Users, b"[]").expect("save");
        store.compact().expect("compact");
        assert_eq!(store.load(Collection::Users).expect("load"), b"[]");
    }
}
