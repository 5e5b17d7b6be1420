//! # Media Storage
//!
//! Uploaded images are written under a media root and addressed by public
//! references:
//! - post media: `/uploads/<name>` -> `<root>/<name>`
//! - banners: `/uploads/banners/<name>` -> `<root>/banners/<name>`
//!
//! Only jpeg/jpg/png/gif files are accepted, checked on both the extension
//! and the leading magic bytes. Releasing a reference is best-effort for the
//! caller: errors are returned so they can be logged, never acted upon.

use crate::ids::IdGenerator;
use crate::primitives::{ALLOWED_IMAGE_EXTENSIONS, DEFAULT_MAX_UPLOAD_BYTES};
use crate::AgoraError;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Public prefix of every media reference.
pub const UPLOADS_PREFIX: &str = "/uploads/";

/// Where an upload is filed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFolder {
    Posts,
    Banners,
}

impl MediaFolder {
    fn subdir(self) -> Option<&'static str> {
        match self {
            Self::Posts => None,
            Self::Banners => Some("banners"),
        }
    }
}

/// An image received from a client, not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUpload {
    /// Client-side file name; only its extension is used.
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Collaborator that stores uploads and releases references.
pub trait MediaStore: Send + Sync {
    /// Store an upload and return its public reference.
    fn store(&self, folder: MediaFolder, filename: &str, bytes: &[u8]) -> Result<String, AgoraError>;

    /// Delete the file behind a reference.
    fn release(&self, reference: &str) -> Result<(), AgoraError>;
}

// =============================================================================
// DISK MEDIA
// =============================================================================

/// Media store writing into a directory on disk.
#[derive(Debug)]
pub struct DiskMedia {
    root: PathBuf,
    max_bytes: usize,
    names: IdGenerator,
}

impl DiskMedia {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_limit(root, DEFAULT_MAX_UPLOAD_BYTES)
    }

    pub fn with_limit(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
            names: IdGenerator::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a public reference to a path under the root.
    ///
    /// Returns `None` for references outside `/uploads/` or containing
    /// anything but plain path segments.
    pub fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let relative = Path::new(reference.strip_prefix(UPLOADS_PREFIX)?);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        (plain && relative.components().next().is_some()).then(|| self.root.join(relative))
    }
}

impl MediaStore for DiskMedia {
    fn store(&self, folder: MediaFolder, filename: &str, bytes: &[u8]) -> Result<String, AgoraError> {
        let extension = image_extension(filename)?;
        if bytes.len() > self.max_bytes {
            return Err(AgoraError::InvalidArgument(format!(
                "File exceeds the {} byte upload limit",
                self.max_bytes
            )));
        }
        if sniff_image(bytes).is_none() {
            return Err(only_images());
        }

        let mut dir = self.root.clone();
        if let Some(sub) = folder.subdir() {
            dir.push(sub);
        }
        fs::create_dir_all(&dir).map_err(|e| {
            tracing::error!(dir = %dir.display(), error = %e, "failed to create media directory");
            AgoraError::Internal(format!("Failed to store upload: {}", e))
        })?;

        let name = format!("{}.{}", self.names.next(), extension);
        let path = dir.join(&name);
        fs::File::create_new(&path)
            .and_then(|mut file| file.write_all(bytes))
            .map_err(|e| {
                tracing::error!(path = %path.display(), error = %e, "failed to write upload");
                AgoraError::Internal(format!("Failed to store upload: {}", e))
            })?;

        let reference = match folder.subdir() {
            Some(sub) => format!("{}{}/{}", UPLOADS_PREFIX, sub, name),
            None => format!("{}{}", UPLOADS_PREFIX, name),
        };
        tracing::debug!(%reference, bytes = bytes.len(), "stored upload");
        Ok(reference)
    }

    fn release(&self, reference: &str) -> Result<(), AgoraError> {
        let path = self.resolve(reference).ok_or_else(|| {
            AgoraError::InvalidArgument(format!("Not a media reference: {}", reference))
        })?;
        fs::remove_file(&path)
            .map_err(|e| AgoraError::Internal(format!("Failed to delete {}: {}", path.display(), e)))
    }
}

/// Lower-cased extension of `filename` if it is an accepted image type.
fn image_extension(filename: &str) -> Result<String, AgoraError> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|e| ALLOWED_IMAGE_EXTENSIONS.contains(&e.as_str()))
        .ok_or_else(only_images)
}

/// Detect the image format from its leading bytes.
pub fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else {
        None
    }
}

fn only_images() -> AgoraError {
    AgoraError::InvalidArgument("Only images are allowed!".to_string())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    #[test]
    fn store_and_release_post_media() {
        let dir = tempfile::tempdir().expect("tempdir");
        let media = DiskMedia::new(dir.path());

        let reference = media.store(MediaFolder::Posts, "cat.PNG", PNG).expect("store");
        assert!(reference.starts_with("/uploads/"));
        assert!(reference.ends_with(".png"));

        let path = media.resolve(&reference).expect("resolve");
        assert!(path.exists());
        media.release(&reference).expect("release");
        assert!(!path.exists());
    }

    #[test]
    fn banners_go_to_their_own_folder() {
        let dir = tempfile::tempdir().expect("tempdir");
        let media = DiskMedia::new(dir.path());
        let reference = media
            .store(MediaFolder::Banners, "b.gif", b"GIF89a....")
            .expect("store");
        assert!(reference.starts_with("/uploads/banners/"));
        assert!(dir.path().join("banners").is_dir());
    }

    #[test]
    fn rejects_non_images() {
        let dir = tempfile::tempdir().expect("tempdir");
        let media = DiskMedia::new(dir.path());
        assert!(matches!(
            media.store(MediaFolder::Posts, "notes.txt", PNG),
            Err(AgoraError::InvalidArgument(_))
        ));
        assert!(matches!(
            media.store(MediaFolder::Posts, "fake.png", b"hello"),
            Err(AgoraError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_oversized_uploads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let media = DiskMedia::with_limit(dir.path(), 4);
        assert!(matches!(
            media.store(MediaFolder::Posts, "big.png", PNG),
            Err(AgoraError::InvalidArgument(_))
        ));
    }

    #[test]
    fn resolve_refuses_escapes() {
        let media = DiskMedia::new("/srv/media");
        assert!(media.resolve("/uploads/../secret").is_none());
        assert!(media.resolve("/etc/passwd").is_none());
        assert!(media.resolve("/uploads/").is_none());
        assert_eq!(
            media.resolve("/uploads/banners/x.png"),
            Some(PathBuf::from("/srv/media/banners/x.png"))
        );
    }

    #[test]
    fn release_of_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let media = DiskMedia::new(dir.path());
        assert!(media.release("/uploads/gone.png").is_err());
    }
}
