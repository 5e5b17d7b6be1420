//! # JSON Directory Store
//!
//! One pretty-printed `<collection>.json` file per collection inside a data
//! directory. Files are replaced atomically: the new document is written to a
//! sibling temp file and renamed over the old one.

use super::{Collection, DocumentStore, EMPTY_COLLECTION, store_error};
use crate::AgoraError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    /// Open (and create if needed) the data directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, AgoraError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .map_err(|e| store_error(None, "failed to create data directory", e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the document backing `collection`.
    pub fn path_of(&self, collection: Collection) -> PathBuf {
        self.root.join(format!("{}.json", collection.name()))
    }
}

impl DocumentStore for JsonDirStore {
    fn load(&self, collection: Collection) -> Result<Vec<u8>, AgoraError> {
        let path = self.path_of(collection);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.save(collection, EMPTY_COLLECTION)?;
                Ok(EMPTY_COLLECTION.to_vec())
            }
            Err(e) => Err(store_error(Some(collection), "failed to read collection", e)),
        }
    }

    fn save(&self, collection: Collection, bytes: &[u8]) -> Result<(), AgoraError> {
        let path = self.path_of(collection);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)
            .map_err(|e| store_error(Some(collection), "failed to write collection", e))?;
        fs::rename(&tmp, &path)
            .map_err(|e| store_error(Some(collection), "failed to replace collection", e))?;
        tracing::debug!(%collection, bytes = bytes.len(), "collection written");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "json"
    }
}
