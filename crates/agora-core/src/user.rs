//! # Users
//!
//! The user directory is a plain ordered collection. Records are created or
//! replaced by an upsert keyed on email and are never deleted.

use crate::AgoraError;
use serde::{Deserialize, Serialize};

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Identity key, unique across the directory.
    pub username: String,
    /// Upsert key.
    pub user_email: String,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(rename = "bannerURL", default, skip_serializing_if = "Option::is_none")]
    pub banner_url: Option<String>,
}

/// Identity fields accepted by the upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: String,
    pub user_email: String,
    #[serde(rename = "photoURL", default)]
    pub photo_url: Option<String>,
}

/// Whether an upsert created a new record or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Replaced,
}

/// Check whether a user record exists for `username`.
pub fn exists(users: &[User], username: &str) -> bool {
    users.iter().any(|u| u.username == username)
}

/// Create or fully replace the user with the profile's email.
///
/// A replaced record loses its bio and banner. Returns the banner reference
/// it dropped, if any, so the caller can release it.
pub fn upsert(
    users: &mut Vec<User>,
    profile: UserProfile,
) -> Result<(Upsert, Option<String>), AgoraError> {
    if profile.username.trim().is_empty() || profile.user_email.trim().is_empty() {
        return Err(AgoraError::InvalidArgument(
            "username and userEmail are required".to_string(),
        ));
    }

    let user = User {
        username: profile.username,
        user_email: profile.user_email,
        photo_url: profile.photo_url,
        bio: None,
        banner_url: None,
    };
    match users.iter_mut().find(|u| u.user_email == user.user_email) {
        Some(existing) => {
            let dropped = std::mem::replace(existing, user).banner_url;
            Ok((Upsert::Replaced, dropped))
        }
        None => {
            users.push(user);
            Ok((Upsert::Created, None))
        }
    }
}

/// Update bio and/or banner of an existing user.
///
/// Blank bios are ignored. Returns the banner reference that was replaced,
/// so the caller can release it.
pub fn update_profile(
    users: &mut [User],
    username: &str,
    bio: Option<String>,
    banner_url: Option<String>,
) -> Result<Option<String>, AgoraError> {
    let user = users
        .iter_mut()
        .find(|u| u.username == username)
        .ok_or_else(|| AgoraError::NotFound("User not found".to_string()))?;

    if let Some(bio) = bio.filter(|b| !b.trim().is_empty()) {
        user.bio = Some(bio);
    }

    match banner_url {
        Some(banner) => Ok(user.banner_url.replace(banner)),
        None => Ok(None),
    }
}

// =============================================================================
// TESTS
// =============================================================================
