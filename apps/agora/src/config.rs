//! # Configuration
//!
//! `AgoraConfig` is read from an optional TOML file and then overridden by
//! environment variables:
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//!
//! [storage]
//! data_dir = "data"
//! backend = "json"        # json | redb | memory
//!
//! [media]
//! dir = "public/uploads"
//! max_upload_bytes = 10485760
//! ```
//!
//! Environment overrides: `AGORA_HOST`, `AGORA_PORT`, `AGORA_DATA_DIR`,
//! `AGORA_BACKEND`, `AGORA_MEDIA_DIR`.

use agora_core::primitives::DEFAULT_MAX_UPLOAD_BYTES;
use agora_core::{
    AgoraError, Coordinator, DiskMedia, DocumentStore, JsonDirStore, MediaStore, MemoryStore,
    RedbStore,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// File name of the redb database inside the data directory.
pub const REDB_FILE: &str = "agora.redb";

// =============================================================================
// BACKEND SELECTION
// =============================================================================

/// Document store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// One pretty-printed JSON file per collection.
    #[default]
    Json,
    /// All collections in one redb database, committed atomically.
    Redb,
    /// Volatile, for tests and demos.
    Memory,
}

impl Backend {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Redb => "redb",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = AgoraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "redb" => Ok(Self::Redb),
            "memory" => Ok(Self::Memory),
            other => Err(AgoraError::InvalidArgument(format!(
                "Unknown backend: {}. Use: json, redb, memory",
                other
            ))),
        }
    }
}

// =============================================================================
// CONFIG SECTIONS
// =============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgoraConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub media: MediaSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub backend: Backend,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backend: Backend::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSettings {
    #[serde(default = "default_media_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            dir: default_media_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("public/uploads")
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

// =============================================================================
// LOADING
// =============================================================================

impl AgoraConfig {
    /// Load the configuration: defaults, then `path` if given, then the
    /// process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, AgoraError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, AgoraError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AgoraError::InvalidArgument(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| AgoraError::InvalidArgument(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, AgoraError> {
        toml::from_str(content)
            .map_err(|e| AgoraError::InvalidArgument(format!("Failed to parse config: {}", e)))
    }

    /// Apply `AGORA_*` overrides read through `lookup`. Empty values are
    /// ignored.
    pub fn apply_env_with(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), AgoraError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = var("AGORA_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("AGORA_PORT") {
            self.server.port = port.trim().parse().map_err(|_| {
                AgoraError::InvalidArgument(format!("AGORA_PORT is not a valid port: {}", port))
            })?;
        }
        if let Some(dir) = var("AGORA_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(backend) = var("AGORA_BACKEND") {
            self.storage.backend = backend.parse()?;
        }
        if let Some(dir) = var("AGORA_MEDIA_DIR") {
            self.media.dir = PathBuf::from(dir);
        }
        Ok(())
    }

    /// Address the server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Path of the redb database for the redb backend.
    pub fn redb_path(&self) -> PathBuf {
        self.storage.data_dir.join(REDB_FILE)
    }

    // =========================================================================
    // WIRING
    // =========================================================================

    /// Open the configured document store.
    pub fn open_store(&self) -> Result<Arc<dyn DocumentStore>, AgoraError> {
        Ok(match self.storage.backend {
            Backend::Json => Arc::new(JsonDirStore::open(&self.storage.data_dir)?),
            Backend::Redb => Arc::new(self.open_redb()?),
            Backend::Memory => Arc::new(MemoryStore::new()),
        })
    }

    /// Open the redb database, creating the data directory first.
    pub fn open_redb(&self) -> Result<RedbStore, AgoraError> {
        std::fs::create_dir_all(&self.storage.data_dir).map_err(|e| {
            AgoraError::Internal(format!(
                "Failed to create {}: {}",
                self.storage.data_dir.display(),
                e
            ))
        })?;
        RedbStore::open(self.redb_path())
    }

    pub fn open_media(&self) -> Arc<dyn MediaStore> {
        Arc::new(DiskMedia::with_limit(&self.media.dir, self.media.max_upload_bytes))
    }

    /// Open the store and load it into a coordinator.
    pub fn open_coordinator(&self) -> Result<Coordinator, AgoraError> {
        let coordinator = Coordinator::open(self.open_store()?, self.open_media())?;
        tracing::info!(
            backend = %self.storage.backend,
            data_dir = %self.storage.data_dir.display(),
            "collections loaded"
        );
        Ok(coordinator)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_values() {
        let config = AgoraConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:3000");
        assert_eq!(config.storage.backend, Backend::Json);
        assert_eq!(config.storage.data_dir, PathBuf::from("data"));
        assert_eq!(config.media.dir, PathBuf::from("public/uploads"));
        assert_eq!(config.media.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = AgoraConfig::from_toml_str(
            r#"
            [server]
            port = 8080

            [storage]
            backend = "redb"
            "#,
        )
        .expect("parse");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, Backend::Redb);
        assert_eq!(config.redb_path(), PathBuf::from("data").join(REDB_FILE));
    }

    #[test]
    fn unknown_backend_in_file_is_rejected() {
        let result = AgoraConfig::from_toml_str("[storage]\nbackend = \"postgres\"\n");
        assert!(matches!(result, Err(AgoraError::InvalidArgument(_))));
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("AGORA_HOST", "0.0.0.0"),
            ("AGORA_PORT", "9000"),
            ("AGORA_BACKEND", "Memory"),
            ("AGORA_MEDIA_DIR", "/srv/uploads"),
            ("AGORA_DATA_DIR", ""),
        ]
        .into_iter()
        .collect();

        let mut config = AgoraConfig::default();
        config
            .apply_env_with(|k| env.get(k).map(|v| v.to_string()))
            .expect("apply");

        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.storage.backend, Backend::Memory);
        assert_eq!(config.media.dir, PathBuf::from("/srv/uploads"));
        assert_eq!(config.storage.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn bad_port_is_an_error() {
        let mut config = AgoraConfig::default();
        let result = config.apply_env_with(|k| (k == "AGORA_PORT").then(|| "http".to_string()));
        assert!(matches!(result, Err(AgoraError::InvalidArgument(_))));
    }

    #[test]
    fn json_backend_creates_data_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = AgoraConfig::default();
        config.storage.data_dir = dir.path().join("nested");
        config.media.dir = dir.path().join("uploads");

        let coordinator = config.open_coordinator().expect("open");
        assert_eq!(coordinator.backend_name(), "json");
        assert!(dir.path().join("nested").is_dir());
    }
}
