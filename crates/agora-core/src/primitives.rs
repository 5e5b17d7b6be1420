//! # Fixed Limits and Constants
//!
//! Hardcoded runtime constants for the Agora core. They are compiled into the
//! binary and are immutable at runtime.

/// Number of characters of free text quoted in a notification message.
pub const EXCERPT_LIMIT: usize = 50;

/// Marker appended to an excerpt when the quoted text was cut.
pub const ELLIPSIS: &str = "...";

/// A poll needs at least this many options.
pub const MIN_POLL_OPTIONS: usize = 2;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length in characters of a caption, comment or reply.
///
/// Longer text is rejected with `InvalidArgument` before any collection is
/// touched.
pub const MAX_TEXT_LENGTH: usize = 65536;

/// Default upper bound for a single uploaded image (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// File extensions accepted by the media store.
pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 4] = ["jpeg", "jpg", "png", "gif"];

// =============================================================================
// SNAPSHOT FORMAT
// =============================================================================

/// Magic bytes for the Agora snapshot header.
pub const MAGIC_BYTES: &[u8; 4] = b"AGRA";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the snapshot layout.
pub const FORMAT_VERSION: u8 = 1;
